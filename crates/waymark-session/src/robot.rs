//! The robot-client seam.
//!
//! The physical robot's wire protocol (authentication, lease keepalive,
//! graph upload, navigation commands) is owned by an external SDK; this
//! trait captures exactly the operations the session layer needs from it.
//! Tests and the local REPL plug in [`SimRobot`][crate::sim::SimRobot]; a
//! deployment plugs in an adapter over the real SDK.

use async_trait::async_trait;
use uuid::Uuid;
use waymark_map::MapData;
use waymark_types::{NavError, WaypointId};

/// Identifier of an in-flight navigation command.
pub type CommandId = Uuid;

/// Motor power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

/// Feedback for an in-flight navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavFeedback {
    /// Still under way.
    Navigating,
    /// Terminal success.
    ReachedGoal,
    /// Terminal failure: localization lost.
    Lost,
    /// Terminal failure: the robot cannot make progress.
    Stuck,
    /// Terminal failure: a hardware or estop condition.
    Impaired,
}

impl NavFeedback {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NavFeedback::Navigating)
    }

    /// User-facing text for terminal failure states.
    pub fn failure_message(self) -> Option<&'static str> {
        match self {
            NavFeedback::Lost => Some("Robot got lost during navigation"),
            NavFeedback::Stuck => Some("Robot got stuck during navigation"),
            NavFeedback::Impaired => Some("Robot is impaired"),
            NavFeedback::Navigating | NavFeedback::ReachedGoal => None,
        }
    }
}

/// Operations the session layer requires from a robot.
///
/// Implementations issue blocking network calls internally; every method is
/// async so callers never stall a cooperative scheduler.
#[async_trait]
pub trait RobotClient: Send + Sync {
    /// Authenticate and establish time sync with the robot.
    async fn authenticate(&self) -> Result<(), NavError>;

    /// Acquire the exclusive control lease.  With `force` the lease is taken
    /// from whoever holds it; otherwise a held lease is
    /// [`NavError::LeaseHeld`].
    async fn acquire_lease(&self, force: bool) -> Result<(), NavError>;

    /// Return the lease so other clients can control the robot.
    async fn release_lease(&self) -> Result<(), NavError>;

    /// Upload the graph and snapshots to the robot.
    async fn upload_map(&self, map: &MapData) -> Result<(), NavError>;

    /// Trigger localization against the nearest fiducial.
    async fn localize_to_fiducial(&self) -> Result<(), NavError>;

    async fn power_on(&self) -> Result<(), NavError>;

    async fn power_off(&self) -> Result<(), NavError>;

    /// Issue (or re-issue) a navigation command toward `waypoint`.  Passing
    /// the previous [`CommandId`] continues that command instead of starting
    /// a new one.
    async fn start_navigation(
        &self,
        waypoint: &WaypointId,
        velocity_limit: f64,
        command_id: Option<CommandId>,
    ) -> Result<CommandId, NavError>;

    /// Poll the status of an in-flight navigation command.
    async fn navigation_feedback(&self, command_id: CommandId) -> Result<NavFeedback, NavError>;

    async fn power_state(&self) -> Result<PowerState, NavError>;

    /// Battery charge in percent, when the robot reports one.
    async fn battery_percent(&self) -> Option<f64>;

    /// Name of the current lease holder, when one exists.
    async fn lease_owner(&self) -> Option<String>;
}
