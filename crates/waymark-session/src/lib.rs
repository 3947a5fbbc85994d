//! `waymark-session` – navigation-session orchestration.
//!
//! Everything above the pure graph algorithms and below the chat surface:
//!
//! - [`robot`] – the [`RobotClient`][robot::RobotClient] seam behind which
//!   the physical robot's authentication, lease, power, and navigation
//!   protocol lives.  The core never speaks the wire protocol itself.
//! - [`sim`] – a scripted in-process [`SimRobot`][sim::SimRobot] so the full
//!   stack runs in headless tests and the local REPL without hardware.
//! - [`session`] – [`NavigationSession`][session::NavigationSession]: an
//!   explicit state machine over connect → upload → localize → navigate →
//!   power-down, with heartbeat status updates and cooperative cancellation.
//! - [`registry`] – [`SessionRegistry`][registry::SessionRegistry]: per-chat
//!   sessions keyed by chat id plus the [`ChatCommand`][registry::ChatCommand]
//!   dispatch that the chat surface drives.

pub mod registry;
pub mod robot;
pub mod session;
pub mod sim;

pub use registry::{ChatCommand, SessionRegistry};
pub use robot::{CommandId, NavFeedback, PowerState, RobotClient};
pub use session::{
    CancelToken, NavigationSession, NullSink, SessionConfig, SessionState, SessionStatus,
    StatusSink,
};
pub use sim::SimRobot;
