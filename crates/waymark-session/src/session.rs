//! [`NavigationSession`] – the connect → navigate → power-down orchestrator.
//!
//! A session owns one loaded map bundle, the derived name index, and a
//! handle to a [`RobotClient`].  Its lifecycle is an explicit state machine:
//!
//! ```text
//! Idle → Authenticating → LeaseAcquisition → Uploading → Localizing → Idle
//!      → Navigating → PoweringDown → Done
//!                    ↘ Failed
//! ```
//!
//! During a navigation the session re-issues the navigation command and
//! polls its feedback on a short interval, emits a heartbeat status line on
//! a fixed wall-clock interval, and checks a cooperative [`CancelToken`]
//! each iteration.  Cancellation is cooperative, never preemptive: the loop
//! notices the token at the next poll boundary.
//!
//! Power etiquette: the motor state is captured at connect time.  A robot
//! this session powered on is powered off after navigating; a robot that
//! was already standing is left standing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};
use waymark_graph::{NameIndex, build_indices, resolve_waypoint};
use waymark_map::MapData;
use waymark_types::{NavError, WaypointId};

use crate::robot::{CommandId, NavFeedback, PowerState, RobotClient};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// How often a heartbeat status line is emitted during navigation.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// How often navigation feedback is polled.
const NAVIGATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often the power state is polled while waiting for motors to spin up.
const POWER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Max velocity passed along with navigation commands (m/s).
const DEFAULT_VELOCITY_LIMIT: f64 = 1.0;

// ─────────────────────────────────────────────────────────────────────────────
// Supporting types
// ─────────────────────────────────────────────────────────────────────────────

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Authenticating,
    LeaseAcquisition,
    Uploading,
    Localizing,
    Navigating,
    PoweringDown,
    Done,
    Failed,
}

/// Cooperative cancellation flag, checked at each polling iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Receiver for user-facing status lines (chat replies, REPL output, logs).
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn send(&self, msg: &str);
}

/// A sink that drops everything; for callers that only want the result.
pub struct NullSink;

#[async_trait]
impl StatusSink for NullSink {
    async fn send(&self, _msg: &str) {}
}

/// Runtime knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Robot hostname, reported in status output.
    pub hostname: String,
    /// Velocity limit passed with navigation commands (m/s).
    pub velocity_limit: f64,
    /// Named delivery locations: lowercase name → short code
    /// (e.g. `"aula"` → `"al"`).
    pub locations: HashMap<String, String>,
    /// Poll and heartbeat intervals; shrunk by tests.
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub power_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hostname: "192.168.80.3".to_string(),
            velocity_limit: DEFAULT_VELOCITY_LIMIT,
            locations: HashMap::new(),
            poll_interval: NAVIGATION_POLL_INTERVAL,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            power_poll_interval: POWER_POLL_INTERVAL,
        }
    }
}

/// Point-in-time session status for the `/status` surface.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub connected: bool,
    pub state: SessionState,
    pub hostname: String,
    pub powered_on: Option<bool>,
    pub battery_percent: Option<f64>,
    pub lease_owner: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// NavigationSession
// ─────────────────────────────────────────────────────────────────────────────

/// One user's connection to the robot, owning the loaded map and its derived
/// name index.
pub struct NavigationSession {
    robot: Arc<dyn RobotClient>,
    map: MapData,
    names: NameIndex,
    config: SessionConfig,
    state: SessionState,
    connected: bool,
    powered_on: bool,
    started_powered_on: bool,
    connected_at: Option<DateTime<Utc>>,
    cancel: CancelToken,
}

impl NavigationSession {
    pub fn new(robot: Arc<dyn RobotClient>, map: MapData, config: SessionConfig) -> Self {
        let (names, _) = build_indices(&map.graph);
        Self {
            robot,
            map,
            names,
            config,
            state: SessionState::Idle,
            connected: false,
            powered_on: false,
            started_powered_on: false,
            connected_at: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token to cancel an in-flight navigation from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Connect to the robot: authenticate, acquire the lease, upload the
    /// map, localize against a fiducial.  Each step is reported through
    /// `sink`; failures carry user-facing guidance text.
    pub async fn connect(&mut self, force: bool, sink: &dyn StatusSink) -> Result<(), NavError> {
        self.state = SessionState::Authenticating;
        sink.send("Connecting to the robot...").await;
        if let Err(e) = self.robot.authenticate().await {
            error!(error = %e, hostname = %self.config.hostname, "authentication failed");
            sink.send(&format!(
                "Cannot reach the robot at {}\n\n\
                 Check:\n\
                 1. Is the robot powered on?\n\
                 2. Is the hostname correct?\n\
                 3. Are you on the robot's network?",
                self.config.hostname
            ))
            .await;
            self.state = SessionState::Failed;
            return Err(e);
        }
        sink.send("Authenticated with the robot").await;

        self.state = SessionState::LeaseAcquisition;
        if force {
            sink.send("Force-acquiring lease (taking control)...").await;
        } else {
            sink.send("Acquiring lease...").await;
        }
        if let Err(e) = self.robot.acquire_lease(force).await {
            if let NavError::LeaseHeld(owner) = &e {
                warn!(owner = %owner, "lease already claimed");
                sink.send(
                    "Lease already claimed by another client!\n\n\
                     Options:\n\
                     1. Disconnect the other client\n\
                     2. Release control from the tablet\n\
                     3. Force-connect to take over (use with caution!)",
                )
                .await;
            }
            self.state = SessionState::Failed;
            return Err(e);
        }
        info!(force, "lease acquired, keepalive started");
        sink.send("Lease acquired").await;

        self.state = SessionState::Uploading;
        sink.send("Uploading map...").await;
        self.robot.upload_map(&self.map).await?;
        sink.send("Map uploaded").await;

        self.state = SessionState::Localizing;
        sink.send("Localizing robot (look for a fiducial)...").await;
        self.robot.localize_to_fiducial().await?;
        sink.send("Robot localized successfully!").await;

        // Capture the motor state so disconnect knows whether a power-off is
        // ours to perform.
        self.started_powered_on = self.robot.power_state().await? == PowerState::On;
        self.powered_on = self.started_powered_on;
        info!(motors_on = self.started_powered_on, "initial power state");

        self.connected = true;
        self.connected_at = Some(Utc::now());
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Navigate to a named location, a short code, an annotation name, or a
    /// raw waypoint id.
    pub async fn navigate_to(
        &mut self,
        location: &str,
        sink: &dyn StatusSink,
    ) -> Result<(), NavError> {
        if !self.connected {
            sink.send("Not connected to the robot").await;
            return Err(NavError::NotConnected);
        }

        // Named delivery locations map to short codes; anything else goes to
        // the resolver as-is.
        let lowered = location.to_lowercase();
        let identifier = self
            .config
            .locations
            .get(&lowered)
            .cloned()
            .unwrap_or_else(|| location.to_string());

        let destination =
            match resolve_waypoint(&identifier, Some(&self.map.graph), &self.names) {
                Ok(id) => id,
                Err(e) => {
                    sink.send(&e.to_string()).await;
                    return Err(e);
                }
            };

        // A 2-character identifier echoed back unchanged means the short
        // code matched zero waypoints or several; either way there is
        // nothing to navigate to.
        if identifier.chars().count() == 2 && destination.as_str() == identifier {
            sink.send(&format!("Could not find waypoint for {location}"))
                .await;
            return Err(NavError::NavigationFailed(format!(
                "no unique waypoint for '{identifier}'"
            )));
        }

        self.cancel.reset();

        sink.send("Powering on robot...").await;
        if let Err(e) = self.ensure_powered_on().await {
            error!(error = %e, "failed to power on motors");
            sink.send("Failed to power on robot").await;
            self.state = SessionState::Failed;
            return Err(e);
        }

        info!(location, waypoint = %destination, "starting navigation");
        sink.send(&format!("Navigating to {location}...")).await;
        self.state = SessionState::Navigating;
        let outcome = self.navigate_with_heartbeat(&destination, location, sink).await;

        // Power off only if this session powered the robot on.
        if self.powered_on && !self.started_powered_on {
            self.state = SessionState::PoweringDown;
            if let Err(e) = self.robot.power_off().await {
                warn!(error = %e, "power-off after navigation failed");
            } else {
                self.powered_on = false;
            }
        }

        self.state = if outcome.is_ok() {
            SessionState::Done
        } else {
            SessionState::Failed
        };
        outcome
    }

    /// Disconnect: power down if this session powered up, release the lease.
    pub async fn disconnect(&mut self) -> Result<(), NavError> {
        if self.powered_on && !self.started_powered_on {
            if let Err(e) = self.robot.power_off().await {
                warn!(error = %e, "power-off during disconnect failed");
            } else {
                self.powered_on = false;
            }
        }
        self.robot.release_lease().await?;
        self.connected = false;
        self.connected_at = None;
        self.state = SessionState::Idle;
        info!("disconnected from robot");
        Ok(())
    }

    /// Assemble a point-in-time status report.
    pub async fn status(&self) -> SessionStatus {
        let powered_on = match self.robot.power_state().await {
            Ok(state) => Some(state == PowerState::On),
            Err(e) => {
                debug!(error = %e, "could not read power state");
                None
            }
        };
        SessionStatus {
            connected: self.connected,
            state: self.state,
            hostname: self.config.hostname.clone(),
            powered_on,
            battery_percent: self.robot.battery_percent().await,
            lease_owner: self.robot.lease_owner().await,
            connected_at: self.connected_at,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    async fn ensure_powered_on(&mut self) -> Result<(), NavError> {
        if self.robot.power_state().await? == PowerState::On {
            self.powered_on = true;
            return Ok(());
        }
        info!("powering on motors");
        self.robot.power_on().await?;
        let start = Instant::now();
        loop {
            if self.robot.power_state().await? == PowerState::On {
                info!(elapsed = ?start.elapsed(), "motors powered on");
                self.powered_on = true;
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                return Err(NavError::PowerFailure(
                    "cancelled while waiting for motors".to_string(),
                ));
            }
            sleep(self.config.power_poll_interval).await;
        }
    }

    /// Poll navigation feedback until a terminal status, emitting a
    /// heartbeat line on the configured interval.
    async fn navigate_with_heartbeat(
        &mut self,
        destination: &WaypointId,
        location: &str,
        sink: &dyn StatusSink,
    ) -> Result<(), NavError> {
        let mut command_id: Option<CommandId> = None;
        let start = Instant::now();
        let mut last_heartbeat = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                info!(location, "navigation cancelled");
                sink.send(&format!("Navigation to {location} cancelled")).await;
                return Err(NavError::NavigationFailed("cancelled".to_string()));
            }

            if last_heartbeat.elapsed() >= self.config.heartbeat_interval {
                let elapsed = start.elapsed().as_secs();
                debug!(location, elapsed, "navigation heartbeat");
                sink.send(&format!("Navigating to {location}... ({elapsed}s)"))
                    .await;
                last_heartbeat = Instant::now();
            }

            let id = self
                .robot
                .start_navigation(destination, self.config.velocity_limit, command_id)
                .await?;
            command_id = Some(id);

            match self.robot.navigation_feedback(id).await? {
                NavFeedback::ReachedGoal => {
                    info!(location, "navigation completed: reached goal");
                    return Ok(());
                }
                feedback if feedback.is_terminal() => {
                    let msg = feedback
                        .failure_message()
                        .unwrap_or("Navigation failed");
                    warn!(location, ?feedback, "navigation failed");
                    sink.send(msg).await;
                    return Err(NavError::NavigationFailed(msg.to_string()));
                }
                NavFeedback::Navigating => {}
                // is_terminal covers the rest; unreachable in practice.
                _ => {}
            }

            sleep(self.config.poll_interval).await;
        }
    }
}
