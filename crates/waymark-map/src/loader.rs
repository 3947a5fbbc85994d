//! Map bundle loading.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use waymark_types::{EdgeSnapshot, NavError, NavGraph, Waypoint, WaypointId, WaypointSnapshot};

/// Container for a fully loaded map bundle.
///
/// Owned by the caller and treated as immutable input by the core
/// algorithms; derived indices and positions are computed fresh from it.
#[derive(Debug, Clone)]
pub struct MapData {
    pub graph: NavGraph,
    /// Waypoint id → waypoint, for O(1) lookup.
    pub waypoints: HashMap<WaypointId, Waypoint>,
    /// Snapshot id → waypoint snapshot.
    pub waypoint_snapshots: HashMap<String, WaypointSnapshot>,
    /// Snapshot id → edge snapshot.
    pub edge_snapshots: HashMap<String, EdgeSnapshot>,
}

/// Load a map bundle from `path`.
///
/// # Errors
///
/// [`NavError::MapLoad`] when `graph.json` is missing or cannot be parsed.
/// Snapshot problems are never fatal: each is logged at `warn` and skipped.
pub fn load_map(path: impl AsRef<Path>) -> Result<MapData, NavError> {
    let path = path.as_ref();
    let graph_path = path.join("graph.json");
    let raw = fs::read_to_string(&graph_path).map_err(|e| {
        NavError::MapLoad(format!("graph file not found: {}: {e}", graph_path.display()))
    })?;
    let graph: NavGraph = serde_json::from_str(&raw)
        .map_err(|e| NavError::MapLoad(format!("failed to parse graph file: {e}")))?;

    let mut waypoints = HashMap::new();
    let mut waypoint_snapshots = HashMap::new();
    for waypoint in &graph.waypoints {
        waypoints.insert(waypoint.id.clone(), waypoint.clone());

        let Some(snapshot_id) = waypoint.snapshot_id.as_deref() else {
            continue;
        };
        let snapshot_path = snapshot_file(path, "waypoint_snapshots", snapshot_id);
        match read_snapshot::<WaypointSnapshot>(&snapshot_path) {
            Some(snapshot) => {
                waypoint_snapshots.insert(snapshot.id.clone(), snapshot);
            }
            None => continue,
        }
    }

    let mut edge_snapshots = HashMap::new();
    for edge in &graph.edges {
        let Some(snapshot_id) = edge.snapshot_id.as_deref() else {
            continue;
        };
        let snapshot_path = snapshot_file(path, "edge_snapshots", snapshot_id);
        if let Some(snapshot) = read_snapshot::<EdgeSnapshot>(&snapshot_path) {
            edge_snapshots.insert(snapshot.id.clone(), snapshot);
        }
    }

    info!(
        waypoints = waypoints.len(),
        edges = graph.edges.len(),
        anchors = graph.anchors.len(),
        fiducials = graph.anchored_fiducials.len(),
        "loaded map"
    );

    Ok(MapData {
        graph,
        waypoints,
        waypoint_snapshots,
        edge_snapshots,
    })
}

fn snapshot_file(root: &Path, subdir: &str, id: &str) -> PathBuf {
    root.join(subdir).join(format!("{id}.json"))
}

/// Read and parse one snapshot file; `None` (with a warning) on any failure.
fn read_snapshot<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "snapshot not found, skipping");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse snapshot, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_types::{Edge, RigidTransform};

    fn write_graph(dir: &Path, graph: &NavGraph) {
        fs::write(
            dir.join("graph.json"),
            serde_json::to_string_pretty(graph).unwrap(),
        )
        .unwrap();
    }

    fn sample_graph() -> NavGraph {
        NavGraph {
            waypoints: vec![
                Waypoint {
                    id: WaypointId::from("aula-vast-001"),
                    annotation_name: Some("aula".to_string()),
                    snapshot_id: Some("snap-1".to_string()),
                },
                Waypoint {
                    id: WaypointId::from("turn-west-002"),
                    annotation_name: None,
                    snapshot_id: None,
                },
            ],
            edges: vec![Edge {
                from: WaypointId::from("aula-vast-001"),
                to: WaypointId::from("turn-west-002"),
                from_tform_to: RigidTransform::identity(),
                snapshot_id: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn missing_graph_file_is_a_map_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_map(dir.path()).unwrap_err();
        assert!(matches!(err, NavError::MapLoad(_)));
    }

    #[test]
    fn unparseable_graph_file_is_a_map_load_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("graph.json"), "not json").unwrap();
        let err = load_map(dir.path()).unwrap_err();
        assert!(matches!(err, NavError::MapLoad(_)));
    }

    #[test]
    fn loads_graph_and_indexes_waypoints_by_id() {
        let dir = tempfile::tempdir().unwrap();
        write_graph(dir.path(), &sample_graph());

        let map = load_map(dir.path()).unwrap();
        assert_eq!(map.graph.waypoints.len(), 2);
        assert!(map.waypoints.contains_key(&WaypointId::from("aula-vast-001")));
        // Snapshot file absent: skipped, not fatal.
        assert!(map.waypoint_snapshots.is_empty());
    }

    #[test]
    fn loads_waypoint_snapshots_when_present() {
        let dir = tempfile::tempdir().unwrap();
        write_graph(dir.path(), &sample_graph());
        let snap_dir = dir.path().join("waypoint_snapshots");
        fs::create_dir(&snap_dir).unwrap();
        let snapshot = WaypointSnapshot {
            id: "snap-1".to_string(),
            points: vec![(0.0, 0.0, 1.0)],
            waypoint_tform_cloud: RigidTransform::identity(),
            fiducial_ids: Vec::new(),
        };
        fs::write(
            snap_dir.join("snap-1.json"),
            serde_json::to_string(&snapshot).unwrap(),
        )
        .unwrap();

        let map = load_map(dir.path()).unwrap();
        assert_eq!(map.waypoint_snapshots.len(), 1);
        assert_eq!(map.waypoint_snapshots["snap-1"].points.len(), 1);
    }

    #[test]
    fn corrupt_snapshot_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_graph(dir.path(), &sample_graph());
        let snap_dir = dir.path().join("waypoint_snapshots");
        fs::create_dir(&snap_dir).unwrap();
        fs::write(snap_dir.join("snap-1.json"), "garbage").unwrap();

        let map = load_map(dir.path()).unwrap();
        assert!(map.waypoint_snapshots.is_empty());
    }

    #[test]
    fn loaded_map_feeds_frame_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        write_graph(dir.path(), &sample_graph());

        let map = load_map(dir.path()).unwrap();
        let positions = waymark_graph::compute_waypoint_positions(&map.graph, false);
        assert_eq!(positions.len(), 2);
    }
}
