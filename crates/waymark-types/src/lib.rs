//! `waymark-types` – shared data model for the Waymark stack.
//!
//! Holds the rigid-transform math ([`pose`]), the typed navigation-graph
//! structures ([`graph`]), the snapshot payloads recorded alongside waypoints
//! ([`snapshot`]), and the workspace-wide [`NavError`] taxonomy.  Everything
//! here is plain data: no I/O, no traversal, no robot protocol.

pub mod graph;
pub mod pose;
pub mod snapshot;

pub use graph::{Anchor, AnchoredFiducial, Edge, NavGraph, Position, Waypoint, WaypointId};
pub use pose::{Quaternion, RigidTransform, Vec3};
pub use snapshot::{CloudPoint, EdgeSnapshot, WaypointSnapshot};

use thiserror::Error;

/// Global error type spanning map loading, identifier resolution, and the
/// navigation-session lifecycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// Resolution or navigation was attempted before any graph was available.
    #[error("graph not loaded")]
    GraphNotLoaded,

    /// An annotation name is used by two or more waypoints.
    #[error("waypoint name '{0}' is ambiguous (maps to multiple waypoints)")]
    AmbiguousName(String),

    /// A session command was issued with no live robot connection.
    #[error("not connected to the robot")]
    NotConnected,

    /// The robot lease is already claimed by another client.
    #[error("lease already claimed by '{0}'")]
    LeaseHeld(String),

    /// The robot could not be reached at the configured hostname.
    #[error("robot unreachable: {0}")]
    RobotUnreachable(String),

    /// Motor power-on or power-off did not complete.
    #[error("power failure: {0}")]
    PowerFailure(String),

    /// Navigation reached a terminal non-success status.
    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    /// The map bundle is missing or could not be parsed.
    #[error("map load error: {0}")]
    MapLoad(String),
}
