//! Snapshot payloads captured alongside waypoints and edges.
//!
//! A waypoint snapshot carries the visual feature cloud recorded at that
//! location, expressed in the sensor frame, plus the transform chain needed
//! to bring those points into the waypoint's local frame.

use serde::{Deserialize, Serialize};

use crate::pose::RigidTransform;

/// A single cloud point in the world frame.  `height` duplicates the world z
/// coordinate and is used for color mapping by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub height: f64,
}

/// Sensor data captured at a waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointSnapshot {
    pub id: String,
    /// Feature-cloud points in the sensor frame, as (x, y, z) triples.
    #[serde(default)]
    pub points: Vec<(f64, f64, f64)>,
    /// Transform from the waypoint's local frame to the cloud sensor frame.
    #[serde(default = "RigidTransform::identity")]
    pub waypoint_tform_cloud: RigidTransform,
    /// Ids of fiducials detected while this snapshot was recorded.
    #[serde(default)]
    pub fiducial_ids: Vec<String>,
}

/// Sensor data captured while traversing an edge.  Opaque to the core; kept
/// so a loaded bundle round-trips completely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_defaults_to_identity_sensor_transform() {
        let json = r#"{"id": "snap-1", "points": [[1.0, 2.0, 3.0]]}"#;
        let snap: WaypointSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.waypoint_tform_cloud, RigidTransform::identity());
        assert_eq!(snap.points.len(), 1);
    }
}
