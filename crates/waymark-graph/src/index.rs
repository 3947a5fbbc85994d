//! Derived graph indices.
//!
//! [`build_indices`] makes the two lookup tables everything else consumes: a
//! name index for identifier resolution, and a reverse adjacency map for
//! connectivity queries.  Single pass over waypoints, single pass over
//! edges, no traversal.

use std::collections::HashMap;

use waymark_types::{NavGraph, WaypointId};

/// One entry in the annotation-name table.
///
/// A name on two or more waypoints becomes [`NameEntry::Ambiguous`] rather
/// than an arbitrary pick; looking up an ambiguous name is a hard failure at
/// the resolution layer, never a silent first-match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameEntry {
    Unique(WaypointId),
    Ambiguous,
}

/// Annotation name → waypoint id (or the ambiguous marker).
pub type NameIndex = HashMap<String, NameEntry>;

/// Destination waypoint id → source waypoint ids, each source at most once.
pub type ReverseAdjacency = HashMap<WaypointId, Vec<WaypointId>>;

/// Build the name index and reverse adjacency map from the raw graph.
///
/// O(W + E).  A third or later occurrence of a duplicate name keeps the
/// entry ambiguous; an edge repeated with the same endpoints does not
/// double-insert its source.
pub fn build_indices(graph: &NavGraph) -> (NameIndex, ReverseAdjacency) {
    let mut names: NameIndex = HashMap::new();
    let mut edges: ReverseAdjacency = HashMap::new();

    for waypoint in &graph.waypoints {
        let Some(name) = waypoint.annotation_name.as_deref() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        names
            .entry(name.to_string())
            .and_modify(|entry| *entry = NameEntry::Ambiguous)
            .or_insert_with(|| NameEntry::Unique(waypoint.id.clone()));
    }

    for edge in &graph.edges {
        let sources = edges.entry(edge.to.clone()).or_default();
        if !sources.contains(&edge.from) {
            sources.push(edge.from.clone());
        }
    }

    (names, edges)
}
