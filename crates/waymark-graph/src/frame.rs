//! Frame reconstruction.
//!
//! A recorded graph has no global reference frame: edges store only relative
//! transforms, and anchors (when present) give sparse absolute poses in a
//! shared seed frame.  [`compute_waypoint_transforms`] assigns every
//! reachable waypoint a consistent world pose either directly from anchors
//! or by breadth-first propagation of edge transforms from the first stored
//! waypoint.  Downstream views (edge lines, fiducials, point clouds) reuse
//! those poses so every overlay lives in the same world frame.
//!
//! The traversal walks the *undirected* view of the edge set: out-edges
//! compose the stored transform, in-edges compose its inverse.  Visitation
//! is marked at dequeue time, so a waypoint reachable over several
//! equal-length paths keeps the pose of whichever path dequeues first.  That
//! makes the output deterministic for a fixed graph and root, but dependent
//! on edge insertion order when paths tie.  Waypoints disconnected from the
//! root are simply absent from the result; absence is normal output, not an
//! error.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::seq::index::sample;
use tracing::{debug, info};
use waymark_types::{
    CloudPoint, NavGraph, Position, RigidTransform, Vec3, WaypointId, WaypointSnapshot,
};

/// Compute a world pose for every waypoint that has one.
///
/// Anchor strategy when `use_anchoring` is set and the graph has anchors:
/// each anchored waypoint gets its seed-frame pose, unanchored waypoints are
/// silently excluded (partial maps are expected).  Otherwise BFS from the
/// first stored waypoint placed at identity.
pub fn compute_waypoint_transforms(
    graph: &NavGraph,
    use_anchoring: bool,
) -> HashMap<WaypointId, RigidTransform> {
    if use_anchoring && graph.has_anchoring() {
        return transforms_from_anchors(graph);
    }
    transforms_via_bfs(graph)
}

/// [`compute_waypoint_transforms`] projected down to positions.  Rotation is
/// discarded; no consumer of positions needs it.
pub fn compute_waypoint_positions(
    graph: &NavGraph,
    use_anchoring: bool,
) -> HashMap<WaypointId, Position> {
    compute_waypoint_transforms(graph, use_anchoring)
        .into_iter()
        .map(|(id, tform)| (id, tform.position()))
        .collect()
}

fn transforms_from_anchors(graph: &NavGraph) -> HashMap<WaypointId, RigidTransform> {
    let anchored: HashMap<&WaypointId, RigidTransform> = graph
        .anchors
        .iter()
        .map(|a| (&a.waypoint, a.seed_tform_waypoint))
        .collect();

    let mut transforms = HashMap::new();
    for waypoint in &graph.waypoints {
        if let Some(seed_tform_waypoint) = anchored.get(&waypoint.id) {
            transforms.insert(waypoint.id.clone(), *seed_tform_waypoint);
        }
    }
    transforms
}

fn transforms_via_bfs(graph: &NavGraph) -> HashMap<WaypointId, RigidTransform> {
    let Some(root) = graph.waypoints.first() else {
        return HashMap::new();
    };

    // Edge lookups in both directions, insertion order preserved.
    let mut edges_from: HashMap<&WaypointId, Vec<usize>> = HashMap::new();
    let mut edges_to: HashMap<&WaypointId, Vec<usize>> = HashMap::new();
    for (i, edge) in graph.edges.iter().enumerate() {
        edges_from.entry(&edge.from).or_default().push(i);
        edges_to.entry(&edge.to).or_default().push(i);
    }

    let mut transforms: HashMap<WaypointId, RigidTransform> = HashMap::new();
    let mut visited: HashSet<WaypointId> = HashSet::new();
    let mut queue: VecDeque<(WaypointId, RigidTransform)> = VecDeque::new();
    queue.push_back((root.id.clone(), RigidTransform::identity()));

    while let Some((waypoint_id, world_tform_waypoint)) = queue.pop_front() {
        // Mark at dequeue time: the first path to dequeue a waypoint wins.
        if !visited.insert(waypoint_id.clone()) {
            continue;
        }
        transforms.insert(waypoint_id.clone(), world_tform_waypoint);

        for &i in edges_from.get(&waypoint_id).into_iter().flatten() {
            let edge = &graph.edges[i];
            if visited.contains(&edge.to) {
                continue;
            }
            let world_tform_neighbor = world_tform_waypoint.compose(edge.from_tform_to);
            queue.push_back((edge.to.clone(), world_tform_neighbor));
        }

        for &i in edges_to.get(&waypoint_id).into_iter().flatten() {
            let edge = &graph.edges[i];
            if visited.contains(&edge.from) {
                continue;
            }
            // Traversing against the stored direction: invert the transform.
            let world_tform_neighbor =
                world_tform_waypoint.compose(edge.from_tform_to.inverse());
            queue.push_back((edge.from.clone(), world_tform_neighbor));
        }
    }

    transforms
}

/// Drawable line segments for edges, in edge storage order.
///
/// An edge whose endpoints do not both have a position is dropped, not
/// errored; this is the only place edges are filtered for drawability.
pub fn compute_edge_lines(
    graph: &NavGraph,
    positions: &HashMap<WaypointId, Position>,
) -> Vec<(Position, Position)> {
    graph
        .edges
        .iter()
        .filter_map(|edge| {
            let from = positions.get(&edge.from)?;
            let to = positions.get(&edge.to)?;
            Some((*from, *to))
        })
        .collect()
}

/// Seed-frame positions of anchored fiducials, in the same world frame as
/// waypoint positions so overlays stay geometrically consistent.
pub fn compute_fiducial_positions(graph: &NavGraph) -> HashMap<String, Position> {
    graph
        .anchored_fiducials
        .iter()
        .map(|f| (f.id.clone(), f.seed_tform_object.position()))
        .collect()
}

/// Extract waypoint feature clouds into the world frame, subsampled under
/// two independent caps.
///
/// Each snapshot's points go through `world_tform_waypoint ∘
/// waypoint_tform_cloud`.  Sampling is uniform and without replacement,
/// first per waypoint and then globally; run-to-run variation from the
/// unseeded RNG is acceptable.
pub fn compute_point_clouds(
    graph: &NavGraph,
    snapshots: &HashMap<String, WaypointSnapshot>,
    use_anchoring: bool,
    max_points_per_waypoint: usize,
    max_total_points: usize,
) -> Vec<CloudPoint> {
    let transforms = compute_waypoint_transforms(graph, use_anchoring);
    let mut rng = rand::rng();
    let mut all_points: Vec<CloudPoint> = Vec::new();

    for waypoint in &graph.waypoints {
        let Some(world_tform_waypoint) = transforms.get(&waypoint.id) else {
            continue;
        };
        let Some(snapshot) = waypoint
            .snapshot_id
            .as_deref()
            .and_then(|id| snapshots.get(id))
        else {
            continue;
        };
        if snapshot.points.is_empty() {
            continue;
        }

        let world_tform_cloud = world_tform_waypoint.compose(snapshot.waypoint_tform_cloud);
        let mut world_points: Vec<CloudPoint> = snapshot
            .points
            .iter()
            .map(|&(x, y, z)| {
                let p = world_tform_cloud.apply(Vec3::new(x, y, z));
                CloudPoint {
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    height: p.z,
                }
            })
            .collect();

        if world_points.len() > max_points_per_waypoint {
            world_points = sample(&mut rng, world_points.len(), max_points_per_waypoint)
                .into_iter()
                .map(|i| world_points[i])
                .collect();
        }
        debug!(
            waypoint = %waypoint.id,
            points = world_points.len(),
            "extracted waypoint cloud"
        );
        all_points.extend(world_points);
    }

    if all_points.len() > max_total_points {
        all_points = sample(&mut rng, all_points.len(), max_total_points)
            .into_iter()
            .map(|i| all_points[i])
            .collect();
    }

    info!(points = all_points.len(), "extracted point cloud");
    all_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_types::{Anchor, Edge, Quaternion, Waypoint};

    const TOL: f64 = 1e-2;

    fn wp(id: &str) -> Waypoint {
        Waypoint {
            id: WaypointId::from(id),
            annotation_name: None,
            snapshot_id: None,
        }
    }

    fn translation_edge(from: &str, to: &str, x: f64, y: f64, z: f64) -> Edge {
        Edge {
            from: WaypointId::from(from),
            to: WaypointId::from(to),
            from_tform_to: RigidTransform::new(Vec3::new(x, y, z), Quaternion::identity()),
            snapshot_id: None,
        }
    }

    fn approx(actual: Position, expected: Position) {
        assert!(
            (actual.0 - expected.0).abs() < TOL
                && (actual.1 - expected.1).abs() < TOL
                && (actual.2 - expected.2).abs() < TOL,
            "expected {expected:?}, got {actual:?}"
        );
    }

    // ── BFS strategy ────────────────────────────────────────────────────────

    #[test]
    fn empty_graph_yields_no_positions() {
        let positions = compute_waypoint_positions(&NavGraph::default(), false);
        assert!(positions.is_empty());
    }

    #[test]
    fn isolated_waypoint_sits_at_origin() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1")],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        approx(positions[&WaypointId::from("a-b-1")], (0.0, 0.0, 0.0));
    }

    #[test]
    fn forward_edge_places_neighbor_at_relative_translation() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2")],
            edges: vec![translation_edge("a-b-1", "c-d-2", 1.0, 0.0, 0.0)],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        approx(positions[&WaypointId::from("a-b-1")], (0.0, 0.0, 0.0));
        approx(positions[&WaypointId::from("c-d-2")], (1.0, 0.0, 0.0));
    }

    #[test]
    fn backward_edge_is_traversed_via_inverse() {
        // Edge stored c→a, root is a: the neighbor must land at -translation.
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2")],
            edges: vec![translation_edge("c-d-2", "a-b-1", 1.0, 0.0, 0.0)],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        approx(positions[&WaypointId::from("a-b-1")], (0.0, 0.0, 0.0));
        approx(positions[&WaypointId::from("c-d-2")], (-1.0, 0.0, 0.0));
    }

    #[test]
    fn chain_composes_through_intermediate_waypoints() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2"), wp("e-f-3")],
            edges: vec![
                translation_edge("a-b-1", "c-d-2", 1.0, 0.0, 0.0),
                translation_edge("c-d-2", "e-f-3", 0.0, 2.0, 0.0),
            ],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        approx(positions[&WaypointId::from("e-f-3")], (1.0, 2.0, 0.0));
    }

    #[test]
    fn rotation_in_chain_rotates_downstream_translations() {
        // a→b yaws 90°; b→c moves 1 m along b's local +X, so c lands at +Y.
        let q90z = Quaternion::new(
            std::f64::consts::FRAC_1_SQRT_2,
            0.0,
            0.0,
            std::f64::consts::FRAC_1_SQRT_2,
        );
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2"), wp("e-f-3")],
            edges: vec![
                Edge {
                    from: WaypointId::from("a-b-1"),
                    to: WaypointId::from("c-d-2"),
                    from_tform_to: RigidTransform::new(Vec3::zero(), q90z),
                    snapshot_id: None,
                },
                translation_edge("c-d-2", "e-f-3", 1.0, 0.0, 0.0),
            ],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        approx(positions[&WaypointId::from("e-f-3")], (0.0, 1.0, 0.0));
    }

    #[test]
    fn disconnected_waypoint_is_absent_from_result() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2"), wp("x-y-9")],
            edges: vec![translation_edge("a-b-1", "c-d-2", 1.0, 0.0, 0.0)],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        assert_eq!(positions.len(), 2);
        assert!(!positions.contains_key(&WaypointId::from("x-y-9")));
    }

    #[test]
    fn diamond_graph_keeps_first_dequeued_pose() {
        // Two equal-length paths a→b→d and a→c→d that disagree about d's
        // position.  Edge insertion order makes the b-path dequeue first.
        let graph = NavGraph {
            waypoints: vec![wp("a-a-1"), wp("b-b-2"), wp("c-c-3"), wp("d-d-4")],
            edges: vec![
                translation_edge("a-a-1", "b-b-2", 1.0, 0.0, 0.0),
                translation_edge("a-a-1", "c-c-3", 0.0, 1.0, 0.0),
                translation_edge("b-b-2", "d-d-4", 1.0, 0.0, 0.0),
                translation_edge("c-c-3", "d-d-4", 0.0, 9.0, 0.0),
            ],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        approx(positions[&WaypointId::from("d-d-4")], (2.0, 0.0, 0.0));
        // Deterministic for a fixed graph: a second run agrees.
        let again = compute_waypoint_positions(&graph, false);
        assert_eq!(positions, again);
    }

    // ── Anchor strategy ─────────────────────────────────────────────────────

    #[test]
    fn anchor_strategy_covers_only_anchored_waypoints() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2")],
            edges: vec![translation_edge("a-b-1", "c-d-2", 1.0, 0.0, 0.0)],
            anchors: vec![Anchor {
                waypoint: WaypointId::from("a-b-1"),
                seed_tform_waypoint: RigidTransform::new(
                    Vec3::new(5.0, 6.0, 7.0),
                    Quaternion::identity(),
                ),
            }],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, true);
        // No traversal fallback: c-d-2 is connected but unanchored.
        assert_eq!(positions.len(), 1);
        approx(positions[&WaypointId::from("a-b-1")], (5.0, 6.0, 7.0));
    }

    #[test]
    fn anchoring_disabled_falls_back_to_bfs() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2")],
            edges: vec![translation_edge("a-b-1", "c-d-2", 1.0, 0.0, 0.0)],
            anchors: vec![Anchor {
                waypoint: WaypointId::from("a-b-1"),
                seed_tform_waypoint: RigidTransform::new(
                    Vec3::new(5.0, 6.0, 7.0),
                    Quaternion::identity(),
                ),
            }],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        assert_eq!(positions.len(), 2);
        approx(positions[&WaypointId::from("a-b-1")], (0.0, 0.0, 0.0));
    }

    #[test]
    fn anchor_strategy_is_idempotent() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1")],
            anchors: vec![Anchor {
                waypoint: WaypointId::from("a-b-1"),
                seed_tform_waypoint: RigidTransform::identity(),
            }],
            ..Default::default()
        };
        assert_eq!(
            compute_waypoint_positions(&graph, true),
            compute_waypoint_positions(&graph, true)
        );
    }

    // ── Edge lines ──────────────────────────────────────────────────────────

    #[test]
    fn edge_lines_follow_storage_order() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1"), wp("c-d-2"), wp("e-f-3")],
            edges: vec![
                translation_edge("a-b-1", "c-d-2", 1.0, 0.0, 0.0),
                translation_edge("c-d-2", "e-f-3", 1.0, 0.0, 0.0),
            ],
            ..Default::default()
        };
        let positions = compute_waypoint_positions(&graph, false);
        let lines = compute_edge_lines(&graph, &positions);
        assert_eq!(lines.len(), 2);
        approx(lines[0].0, (0.0, 0.0, 0.0));
        approx(lines[0].1, (1.0, 0.0, 0.0));
    }

    #[test]
    fn edge_with_unpositioned_endpoint_is_dropped() {
        let graph = NavGraph {
            edges: vec![translation_edge("a-b-1", "x-y-9", 1.0, 0.0, 0.0)],
            ..Default::default()
        };
        let mut positions = HashMap::new();
        positions.insert(WaypointId::from("a-b-1"), (0.0, 0.0, 0.0));
        let lines = compute_edge_lines(&graph, &positions);
        assert!(lines.is_empty());
    }

    // ── Fiducials ───────────────────────────────────────────────────────────

    #[test]
    fn fiducial_positions_come_from_seed_frame() {
        let graph = NavGraph {
            anchored_fiducials: vec![waymark_types::AnchoredFiducial {
                id: "523".to_string(),
                seed_tform_object: RigidTransform::new(
                    Vec3::new(2.0, 3.0, 1.0),
                    Quaternion::identity(),
                ),
            }],
            ..Default::default()
        };
        let fiducials = compute_fiducial_positions(&graph);
        approx(fiducials["523"], (2.0, 3.0, 1.0));
    }

    // ── Point clouds ────────────────────────────────────────────────────────

    fn cloud_graph(points: usize) -> (NavGraph, HashMap<String, WaypointSnapshot>) {
        let graph = NavGraph {
            waypoints: vec![Waypoint {
                id: WaypointId::from("a-b-1"),
                annotation_name: None,
                snapshot_id: Some("snap-1".to_string()),
            }],
            ..Default::default()
        };
        let snapshot = WaypointSnapshot {
            id: "snap-1".to_string(),
            points: (0..points).map(|i| (i as f64, 0.0, 0.5)).collect(),
            waypoint_tform_cloud: RigidTransform::identity(),
            fiducial_ids: Vec::new(),
        };
        let mut snapshots = HashMap::new();
        snapshots.insert("snap-1".to_string(), snapshot);
        (graph, snapshots)
    }

    #[test]
    fn cloud_points_land_in_the_world_frame() {
        let (mut graph, snapshots) = cloud_graph(1);
        graph.waypoints.push(wp("c-d-2"));
        graph
            .edges
            .push(translation_edge("c-d-2", "a-b-1", 0.0, 0.0, 0.0));
        let points = compute_point_clouds(&graph, &snapshots, false, 100, 100);
        assert_eq!(points.len(), 1);
        assert!((points[0].z - 0.5).abs() < TOL);
        assert!((points[0].height - points[0].z).abs() < TOL);
    }

    #[test]
    fn per_waypoint_cap_bounds_each_snapshot() {
        let (graph, snapshots) = cloud_graph(50);
        let points = compute_point_clouds(&graph, &snapshots, false, 10, 1000);
        assert_eq!(points.len(), 10);
    }

    #[test]
    fn global_cap_bounds_the_combined_output() {
        let (graph, snapshots) = cloud_graph(50);
        let points = compute_point_clouds(&graph, &snapshots, false, 40, 15);
        assert_eq!(points.len(), 15);
    }

    #[test]
    fn waypoint_without_snapshot_contributes_nothing() {
        let graph = NavGraph {
            waypoints: vec![wp("a-b-1")],
            ..Default::default()
        };
        let points = compute_point_clouds(&graph, &HashMap::new(), false, 10, 10);
        assert!(points.is_empty());
    }
}
