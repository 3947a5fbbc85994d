//! In-process robot simulation for CI and the local REPL.
//!
//! [`SimRobot`] implements [`RobotClient`] with recorded state and a
//! scriptable feedback sequence, so the full session stack runs headless
//! without any physical hardware.  Builder methods configure failure modes
//! (held lease, unreachable host) and the feedback a navigation command
//! reports on successive polls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;
use waymark_map::MapData;
use waymark_types::{NavError, WaypointId};

use crate::robot::{CommandId, NavFeedback, PowerState, RobotClient};

#[derive(Debug, Default)]
struct SimState {
    powered_on: bool,
    lease_acquired: bool,
    map_uploaded: bool,
    localized: bool,
    feedback_script: VecDeque<NavFeedback>,
    /// Every waypoint a navigation command was issued toward.
    nav_targets: Vec<WaypointId>,
}

/// A simulated robot.  Always reachable and lease-free unless configured
/// otherwise; navigation reports [`NavFeedback::ReachedGoal`] immediately
/// unless a feedback script is installed.
pub struct SimRobot {
    state: Mutex<SimState>,
    lease_held_by: Option<String>,
    unreachable: bool,
    battery_percent: Option<f64>,
}

impl SimRobot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            lease_held_by: None,
            unreachable: false,
            battery_percent: Some(87.0),
        }
    }

    /// Simulate a lease already claimed by `owner`; non-forced acquisition
    /// will fail.
    pub fn with_lease_held(mut self, owner: impl Into<String>) -> Self {
        self.lease_held_by = Some(owner.into());
        self
    }

    /// Simulate an unreachable host; authentication will fail.
    pub fn with_unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Start with motors already powered on (the robot was left standing).
    pub fn with_powered_on(self) -> Self {
        self.state.lock().expect("sim lock").powered_on = true;
        self
    }

    /// Install the sequence of feedback values successive polls report.
    /// Once the script is exhausted polls report `ReachedGoal`.
    pub fn with_feedback(self, script: impl IntoIterator<Item = NavFeedback>) -> Self {
        self.state.lock().expect("sim lock").feedback_script = script.into_iter().collect();
        self
    }

    /// Waypoints that navigation commands were issued toward, in order.
    pub fn nav_targets(&self) -> Vec<WaypointId> {
        self.state.lock().expect("sim lock").nav_targets.clone()
    }

    pub fn map_uploaded(&self) -> bool {
        self.state.lock().expect("sim lock").map_uploaded
    }

    pub fn is_powered_on(&self) -> bool {
        self.state.lock().expect("sim lock").powered_on
    }

    pub fn lease_acquired(&self) -> bool {
        self.state.lock().expect("sim lock").lease_acquired
    }
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RobotClient for SimRobot {
    async fn authenticate(&self) -> Result<(), NavError> {
        if self.unreachable {
            return Err(NavError::RobotUnreachable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    async fn acquire_lease(&self, force: bool) -> Result<(), NavError> {
        if let Some(owner) = &self.lease_held_by {
            if !force {
                return Err(NavError::LeaseHeld(owner.clone()));
            }
        }
        self.state.lock().expect("sim lock").lease_acquired = true;
        Ok(())
    }

    async fn release_lease(&self) -> Result<(), NavError> {
        self.state.lock().expect("sim lock").lease_acquired = false;
        Ok(())
    }

    async fn upload_map(&self, _map: &MapData) -> Result<(), NavError> {
        self.state.lock().expect("sim lock").map_uploaded = true;
        Ok(())
    }

    async fn localize_to_fiducial(&self) -> Result<(), NavError> {
        self.state.lock().expect("sim lock").localized = true;
        Ok(())
    }

    async fn power_on(&self) -> Result<(), NavError> {
        self.state.lock().expect("sim lock").powered_on = true;
        Ok(())
    }

    async fn power_off(&self) -> Result<(), NavError> {
        self.state.lock().expect("sim lock").powered_on = false;
        Ok(())
    }

    async fn start_navigation(
        &self,
        waypoint: &WaypointId,
        _velocity_limit: f64,
        command_id: Option<CommandId>,
    ) -> Result<CommandId, NavError> {
        self.state
            .lock()
            .expect("sim lock")
            .nav_targets
            .push(waypoint.clone());
        Ok(command_id.unwrap_or_else(Uuid::new_v4))
    }

    async fn navigation_feedback(&self, _command_id: CommandId) -> Result<NavFeedback, NavError> {
        Ok(self
            .state
            .lock()
            .expect("sim lock")
            .feedback_script
            .pop_front()
            .unwrap_or(NavFeedback::ReachedGoal))
    }

    async fn power_state(&self) -> Result<PowerState, NavError> {
        if self.state.lock().expect("sim lock").powered_on {
            Ok(PowerState::On)
        } else {
            Ok(PowerState::Off)
        }
    }

    async fn battery_percent(&self) -> Option<f64> {
        self.battery_percent
    }

    async fn lease_owner(&self) -> Option<String> {
        if self.state.lock().expect("sim lock").lease_acquired {
            return Some("waymark".to_string());
        }
        self.lease_held_by.clone()
    }
}
