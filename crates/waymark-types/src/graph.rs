//! Typed navigation-graph structures.
//!
//! A recorded map is a graph of [`Waypoint`]s joined by [`Edge`]s carrying
//! relative transforms.  There is no global reference frame: absolute
//! positions exist only as the *derived* output of frame reconstruction, or
//! as sparse [`Anchor`]s when the map was recorded with a seed frame.  All
//! structures are immutable for the lifetime of a loaded map.

use serde::{Deserialize, Serialize};

use crate::pose::RigidTransform;

/// Derived world coordinates.  Never stored in the map itself.
pub type Position = (f64, f64, f64);

/// Opaque waypoint identifier: hyphen-joined tokens assigned at recording
/// time, unique within a graph (e.g. `"undocked-groat-icFsvBqvgHAin.EZ75lEmQ=="`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointId(pub String);

impl WaypointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WaypointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WaypointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A recorded robot pose in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    /// Human name given at recording time.  Not guaranteed unique.
    #[serde(default)]
    pub annotation_name: Option<String>,
    /// Reference to the sensor snapshot captured at this location.
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

/// A directed link between two waypoints.
///
/// `from_tform_to` takes a point expressed in the `to` waypoint's local frame
/// into the `from` waypoint's local frame.  The transform is rigid and
/// therefore always invertible, which is what lets traversal walk an edge
/// backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: WaypointId,
    pub to: WaypointId,
    pub from_tform_to: RigidTransform,
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

/// An absolute pose for one waypoint in the shared seed frame.  Anchors are
/// sparse; presence of any anchor signals that a globally consistent frame
/// is available without traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub waypoint: WaypointId,
    pub seed_tform_waypoint: RigidTransform,
}

/// A fiducial (AprilTag) with a known seed-frame pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchoredFiducial {
    pub id: String,
    pub seed_tform_object: RigidTransform,
}

/// The full navigation graph as recorded.
///
/// Waypoint order is significant: frame reconstruction without anchors roots
/// its traversal at the *first* stored waypoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NavGraph {
    pub waypoints: Vec<Waypoint>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub anchored_fiducials: Vec<AnchoredFiducial>,
}

impl NavGraph {
    /// Look up a waypoint by id.  Linear scan; graphs are map-scale.
    pub fn waypoint(&self, id: &WaypointId) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| &w.id == id)
    }

    /// `true` when the map was recorded with a seed frame.
    pub fn has_anchoring(&self) -> bool {
        !self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::RigidTransform;

    fn wp(id: &str) -> Waypoint {
        Waypoint {
            id: WaypointId::from(id),
            annotation_name: None,
            snapshot_id: None,
        }
    }

    #[test]
    fn waypoint_lookup_by_id() {
        let graph = NavGraph {
            waypoints: vec![wp("aula-vast-001"), wp("turn-west-002")],
            ..Default::default()
        };
        assert!(graph.waypoint(&WaypointId::from("turn-west-002")).is_some());
        assert!(graph.waypoint(&WaypointId::from("missing")).is_none());
    }

    #[test]
    fn has_anchoring_reflects_anchor_presence() {
        let mut graph = NavGraph::default();
        assert!(!graph.has_anchoring());
        graph.anchors.push(Anchor {
            waypoint: WaypointId::from("aula-vast-001"),
            seed_tform_waypoint: RigidTransform::identity(),
        });
        assert!(graph.has_anchoring());
    }

    #[test]
    fn graph_serde_roundtrip() {
        let graph = NavGraph {
            waypoints: vec![wp("aula-vast-001")],
            edges: vec![Edge {
                from: WaypointId::from("aula-vast-001"),
                to: WaypointId::from("turn-west-002"),
                from_tform_to: RigidTransform::identity(),
                snapshot_id: None,
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&graph).unwrap();
        let back: NavGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, back);
    }

    #[test]
    fn waypoint_id_serializes_as_plain_string() {
        let id = WaypointId::from("aula-vast-001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"aula-vast-001\"");
    }
}
