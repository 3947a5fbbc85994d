//! `waymark-viewer` – 3D scene assembly for recorded maps.
//!
//! Builds a plotly-compatible figure document (`data` + `layout` JSON) from
//! a loaded map: point clouds behind, edge lines, waypoint markers,
//! highlighted waypoints with labels, and fiducials as orange diamonds.
//! [`html::export_html`] wraps the figure in a standalone page that pulls
//! the plot library from a CDN, so the output opens in any browser with no
//! local install.

pub mod html;
pub mod scene;

pub use html::export_html;
pub use scene::{SceneOptions, WaypointInfo, build_figure, extract_waypoint_info};
