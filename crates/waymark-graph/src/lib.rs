//! `waymark-graph` – graph algorithms over the recorded map.
//!
//! The three reusable pieces of the whole stack live here:
//!
//! - [`resolve`] – [`short_code`][resolve::short_code] /
//!   [`resolve_waypoint`][resolve::resolve_waypoint]: turns a user-supplied
//!   short code, annotation name, or raw id into the unique waypoint id,
//!   surfacing ambiguity instead of silently picking one.
//! - [`index`] – [`build_indices`][index::build_indices]: derives the
//!   annotation-name table (with an explicit ambiguous marker) and the
//!   reverse adjacency map from the raw graph in one pass each.
//! - [`frame`] – frame reconstruction: assigns every waypoint, edge endpoint,
//!   and fiducial a consistent world position from purely relative pose
//!   data, via sparse anchors or breadth-first transform propagation.
//!
//! Everything is a synchronous pure function over an immutable graph; calls
//! recompute from scratch, which is fine at map scale (hundreds to low
//! thousands of waypoints).

pub mod frame;
pub mod index;
pub mod resolve;

pub use frame::{
    compute_edge_lines, compute_fiducial_positions, compute_point_clouds,
    compute_waypoint_positions, compute_waypoint_transforms,
};
pub use index::{NameEntry, NameIndex, ReverseAdjacency, build_indices};
pub use resolve::{resolve_waypoint, short_code};
