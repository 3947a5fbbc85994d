//! `waymark-map` – loads a recorded map bundle from disk.
//!
//! A bundle is a directory containing `graph.json` (the [`NavGraph`]) plus
//! optional `waypoint_snapshots/` and `edge_snapshots/` subdirectories with
//! one JSON file per snapshot id.  Loading produces an immutable [`MapData`]
//! that every core algorithm takes as read-only input; nothing here mutates
//! a loaded map.
//!
//! A missing or unparseable graph file is fatal; a missing or unparseable
//! snapshot is logged and skipped, since maps recorded with partial sensor
//! coverage are common.

pub mod loader;

pub use loader::{MapData, load_map};
