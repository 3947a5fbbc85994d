//! Figure assembly: map data in, plotly-compatible JSON out.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::debug;
use waymark_graph::{
    compute_edge_lines, compute_fiducial_positions, compute_point_clouds,
    compute_waypoint_positions, short_code,
};
use waymark_map::MapData;
use waymark_types::Position;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

const WAYPOINT_COLOR: &str = "royalblue";
const HIGHLIGHT_COLOR: &str = "limegreen";
const FIDUCIAL_COLOR: &str = "orange";
const EDGE_COLOR: &str = "gray";

const WAYPOINT_SIZE: u32 = 6;
const HIGHLIGHT_SIZE: u32 = 14;
const FIDUCIAL_SIZE: u32 = 8;

const DEFAULT_MAX_POINTS_PER_WAYPOINT: usize = 4_000;
const DEFAULT_MAX_TOTAL_POINTS: usize = 200_000;

// ─────────────────────────────────────────────────────────────────────────────
// WaypointInfo
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the viewer shows about one positioned waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointInfo {
    pub id: String,
    pub short_code: Option<String>,
    pub name: Option<String>,
    pub position: Position,
    /// Fiducials detected in this waypoint's snapshot.
    pub fiducial_count: usize,
    /// Human name from the named-location table, when its short code points
    /// at this waypoint.
    pub location_name: Option<String>,
}

/// Collect per-waypoint display info for every waypoint present in
/// `positions`.  `locations` maps a human name to a short code; output is
/// sorted by waypoint id so repeated renders are stable.
pub fn extract_waypoint_info(
    map: &MapData,
    positions: &HashMap<waymark_types::WaypointId, Position>,
    locations: &HashMap<String, String>,
) -> Vec<WaypointInfo> {
    let code_to_location: HashMap<&str, &str> = locations
        .iter()
        .map(|(name, code)| (code.as_str(), name.as_str()))
        .collect();

    let mut infos: Vec<WaypointInfo> = map
        .graph
        .waypoints
        .iter()
        .filter_map(|wp| {
            let position = *positions.get(&wp.id)?;
            let code = short_code(&wp.id);
            let fiducial_count = wp
                .snapshot_id
                .as_ref()
                .and_then(|sid| map.waypoint_snapshots.get(sid))
                .map(|snap| snap.fiducial_ids.len())
                .unwrap_or(0);
            let location_name = code
                .as_deref()
                .and_then(|c| code_to_location.get(c))
                .map(|name| name.to_string());
            Some(WaypointInfo {
                id: wp.id.as_str().to_string(),
                short_code: code,
                name: wp.annotation_name.clone(),
                position,
                fiducial_count,
                location_name,
            })
        })
        .collect();
    infos.sort_by(|a, b| a.id.cmp(&b.id));
    infos
}

// ─────────────────────────────────────────────────────────────────────────────
// SceneOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Knobs for figure assembly.
#[derive(Debug, Clone)]
pub struct SceneOptions {
    pub title: String,
    /// Short codes or annotation names to highlight (case-insensitive).
    pub highlights: Vec<String>,
    pub show_edges: bool,
    pub show_fiducials: bool,
    pub show_labels: bool,
    pub show_point_clouds: bool,
    pub use_anchoring: bool,
    /// Named-location table (human name → short code) for hover text.
    pub locations: HashMap<String, String>,
    pub max_points_per_waypoint: usize,
    pub max_total_points: usize,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            title: "Recorded map".to_string(),
            highlights: Vec::new(),
            show_edges: true,
            show_fiducials: true,
            show_labels: false,
            show_point_clouds: false,
            use_anchoring: false,
            locations: HashMap::new(),
            max_points_per_waypoint: DEFAULT_MAX_POINTS_PER_WAYPOINT,
            max_total_points: DEFAULT_MAX_TOTAL_POINTS,
        }
    }
}

impl SceneOptions {
    fn is_highlighted(&self, info: &WaypointInfo) -> bool {
        self.highlights.iter().any(|h| {
            let matches_code = info
                .short_code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(h));
            let matches_name = info
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(h));
            matches_code || matches_name
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Figure assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Build a plotly-compatible figure document from a loaded map.
///
/// Trace order is back-to-front: point cloud first so markers draw on top
/// of it, then edges, waypoints, highlights, fiducials.
pub fn build_figure(map: &MapData, options: &SceneOptions) -> Value {
    let positions = compute_waypoint_positions(&map.graph, options.use_anchoring);
    let infos = extract_waypoint_info(map, &positions, &options.locations);
    debug!(
        waypoints = infos.len(),
        edges = map.graph.edges.len(),
        "assembling figure"
    );

    let mut traces: Vec<Value> = Vec::new();

    if options.show_point_clouds {
        let cloud = compute_point_clouds(
            &map.graph,
            &map.waypoint_snapshots,
            options.use_anchoring,
            options.max_points_per_waypoint,
            options.max_total_points,
        );
        if !cloud.is_empty() {
            traces.push(point_cloud_trace(&cloud));
        }
    }

    if options.show_edges {
        let lines = compute_edge_lines(&map.graph, &positions);
        if !lines.is_empty() {
            traces.push(edge_trace(&lines));
        }
    }

    let (highlighted, regular): (Vec<&WaypointInfo>, Vec<&WaypointInfo>) =
        infos.iter().partition(|i| options.is_highlighted(i));

    if !regular.is_empty() {
        traces.push(waypoint_trace(
            &regular,
            "Waypoints",
            WAYPOINT_COLOR,
            WAYPOINT_SIZE,
            options.show_labels,
        ));
    }
    if !highlighted.is_empty() {
        // Highlights always carry labels so they can be found at a glance.
        traces.push(waypoint_trace(
            &highlighted,
            "Highlighted",
            HIGHLIGHT_COLOR,
            HIGHLIGHT_SIZE,
            true,
        ));
    }

    if options.show_fiducials {
        let fiducials = compute_fiducial_positions(&map.graph);
        if !fiducials.is_empty() {
            traces.push(fiducial_trace(&fiducials));
        }
    }

    let trace_names: Vec<String> = traces
        .iter()
        .map(|t| t["name"].as_str().unwrap_or("").to_string())
        .collect();

    json!({
        "data": traces,
        "layout": {
            "title": { "text": options.title },
            "scene": {
                "aspectmode": "data",
                "xaxis": { "title": { "text": "x (m)" } },
                "yaxis": { "title": { "text": "y (m)" } },
                "zaxis": { "title": { "text": "z (m)" } },
            },
            "margin": { "l": 0, "r": 0, "t": 40, "b": 0 },
            "showlegend": true,
            "updatemenus": visibility_menu(&trace_names),
        },
    })
}

/// Dropdown presets toggling trace visibility: "Show all" plus one "Hide
/// <trace>" entry per trace.
fn visibility_menu(trace_names: &[String]) -> Value {
    let mut buttons = vec![json!({
        "label": "Show all",
        "method": "restyle",
        "args": ["visible", vec![true; trace_names.len()]],
    })];
    for (i, name) in trace_names.iter().enumerate() {
        let mut visible = vec![true; trace_names.len()];
        visible[i] = false;
        buttons.push(json!({
            "label": format!("Hide {}", name.to_lowercase()),
            "method": "restyle",
            "args": ["visible", visible],
        }));
    }
    json!([{
        "type": "dropdown",
        "direction": "down",
        "showactive": true,
        "x": 0.0,
        "y": 1.08,
        "buttons": buttons,
    }])
}

fn point_cloud_trace(cloud: &[waymark_types::CloudPoint]) -> Value {
    json!({
        "type": "scatter3d",
        "name": "Point cloud",
        "mode": "markers",
        "x": cloud.iter().map(|p| p.x).collect::<Vec<_>>(),
        "y": cloud.iter().map(|p| p.y).collect::<Vec<_>>(),
        "z": cloud.iter().map(|p| p.z).collect::<Vec<_>>(),
        "marker": {
            "size": 1,
            "color": cloud.iter().map(|p| p.height).collect::<Vec<_>>(),
            "colorscale": "Viridis",
            "opacity": 0.6,
        },
        "hoverinfo": "skip",
    })
}

/// Edge line segments in a single trace, `null`-separated so plotly breaks
/// the polyline between segments.
fn edge_trace(lines: &[(Position, Position)]) -> Value {
    let mut xs: Vec<Value> = Vec::with_capacity(lines.len() * 3);
    let mut ys: Vec<Value> = Vec::with_capacity(lines.len() * 3);
    let mut zs: Vec<Value> = Vec::with_capacity(lines.len() * 3);
    for (from, to) in lines {
        xs.extend([json!(from.0), json!(to.0), Value::Null]);
        ys.extend([json!(from.1), json!(to.1), Value::Null]);
        zs.extend([json!(from.2), json!(to.2), Value::Null]);
    }
    json!({
        "type": "scatter3d",
        "name": "Edges",
        "mode": "lines",
        "x": xs,
        "y": ys,
        "z": zs,
        "line": { "color": EDGE_COLOR, "width": 2 },
        "hoverinfo": "skip",
    })
}

fn waypoint_trace(
    infos: &[&WaypointInfo],
    name: &str,
    color: &str,
    size: u32,
    labeled: bool,
) -> Value {
    let hover: Vec<String> = infos.iter().map(|i| hover_text(i)).collect();
    let labels: Vec<&str> = infos
        .iter()
        .map(|i| i.short_code.as_deref().unwrap_or(""))
        .collect();
    json!({
        "type": "scatter3d",
        "name": name,
        "mode": if labeled { "markers+text" } else { "markers" },
        "x": infos.iter().map(|i| i.position.0).collect::<Vec<_>>(),
        "y": infos.iter().map(|i| i.position.1).collect::<Vec<_>>(),
        "z": infos.iter().map(|i| i.position.2).collect::<Vec<_>>(),
        "marker": { "size": size, "color": color },
        "text": labels,
        "textposition": "top center",
        "hovertext": hover,
        "hoverinfo": "text",
    })
}

fn hover_text(info: &WaypointInfo) -> String {
    let mut parts = Vec::new();
    if let Some(location) = &info.location_name {
        parts.push(format!("Location: {location}"));
    }
    if let Some(name) = &info.name {
        parts.push(format!("Name: {name}"));
    }
    if let Some(code) = &info.short_code {
        parts.push(format!("Code: {code}"));
    }
    parts.push(format!("Id: {}", info.id));
    if info.fiducial_count > 0 {
        parts.push(format!("Fiducials: {}", info.fiducial_count));
    }
    parts.join("<br>")
}

fn fiducial_trace(fiducials: &HashMap<String, Position>) -> Value {
    let mut entries: Vec<(&String, &Position)> = fiducials.iter().collect();
    entries.sort_by_key(|(id, _)| id.as_str());
    json!({
        "type": "scatter3d",
        "name": "Fiducials",
        "mode": "markers",
        "x": entries.iter().map(|(_, p)| p.0).collect::<Vec<_>>(),
        "y": entries.iter().map(|(_, p)| p.1).collect::<Vec<_>>(),
        "z": entries.iter().map(|(_, p)| p.2).collect::<Vec<_>>(),
        "marker": { "size": FIDUCIAL_SIZE, "color": FIDUCIAL_COLOR, "symbol": "diamond" },
        "hovertext": entries.iter().map(|(id, _)| format!("Fiducial {id}")).collect::<Vec<_>>(),
        "hoverinfo": "text",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_types::{
        Anchor, AnchoredFiducial, Edge, NavGraph, RigidTransform, Vec3, Waypoint,
        WaypointSnapshot,
    };

    fn translation(x: f64, y: f64, z: f64) -> RigidTransform {
        RigidTransform::new(Vec3::new(x, y, z), waymark_types::Quaternion::identity())
    }

    fn test_map() -> MapData {
        let graph = NavGraph {
            waypoints: vec![
                Waypoint {
                    id: "aula-vast-001".into(),
                    annotation_name: Some("aula".to_string()),
                    snapshot_id: Some("snap-1".to_string()),
                },
                Waypoint {
                    id: "turn-west-002".into(),
                    annotation_name: None,
                    snapshot_id: None,
                },
            ],
            edges: vec![Edge {
                from: "aula-vast-001".into(),
                to: "turn-west-002".into(),
                from_tform_to: translation(2.0, 0.0, 0.0),
                snapshot_id: None,
            }],
            anchors: vec![],
            anchored_fiducials: vec![AnchoredFiducial {
                id: "tag-52".to_string(),
                seed_tform_object: translation(1.0, 1.0, 0.5),
            }],
        };
        let waypoints = graph
            .waypoints
            .iter()
            .map(|w| (w.id.clone(), w.clone()))
            .collect();
        let mut waypoint_snapshots = HashMap::new();
        waypoint_snapshots.insert(
            "snap-1".to_string(),
            WaypointSnapshot {
                id: "snap-1".to_string(),
                points: vec![(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)],
                waypoint_tform_cloud: RigidTransform::identity(),
                fiducial_ids: vec!["tag-52".to_string()],
            },
        );
        MapData {
            graph,
            waypoints,
            waypoint_snapshots,
            edge_snapshots: HashMap::new(),
        }
    }

    fn trace_names(figure: &Value) -> Vec<String> {
        figure["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn info_carries_code_name_and_fiducial_count() {
        let map = test_map();
        let positions = compute_waypoint_positions(&map.graph, false);
        let mut locations = HashMap::new();
        locations.insert("aula magna".to_string(), "av".to_string());

        let infos = extract_waypoint_info(&map, &positions, &locations);
        assert_eq!(infos.len(), 2);
        let aula = &infos[0];
        assert_eq!(aula.id, "aula-vast-001");
        assert_eq!(aula.short_code.as_deref(), Some("av"));
        assert_eq!(aula.name.as_deref(), Some("aula"));
        assert_eq!(aula.fiducial_count, 1);
        assert_eq!(aula.location_name.as_deref(), Some("aula magna"));
        assert_eq!(infos[1].fiducial_count, 0);
        assert_eq!(infos[1].location_name, None);
    }

    #[test]
    fn info_skips_waypoints_without_positions() {
        let map = test_map();
        // Only one waypoint positioned.
        let mut positions = HashMap::new();
        positions.insert("aula-vast-001".into(), (0.0, 0.0, 0.0));
        let infos = extract_waypoint_info(&map, &positions, &HashMap::new());
        assert_eq!(infos.len(), 1);
    }

    #[test]
    fn default_figure_has_edges_waypoints_and_fiducials() {
        let figure = build_figure(&test_map(), &SceneOptions::default());
        assert_eq!(trace_names(&figure), ["Edges", "Waypoints", "Fiducials"]);
        assert_eq!(figure["layout"]["scene"]["aspectmode"], "data");
    }

    #[test]
    fn visibility_menu_offers_one_hide_button_per_trace() {
        let figure = build_figure(&test_map(), &SceneOptions::default());
        let menu = &figure["layout"]["updatemenus"][0];
        let buttons = menu["buttons"].as_array().unwrap();
        // "Show all" plus Edges, Waypoints, Fiducials.
        assert_eq!(buttons.len(), 4);
        assert_eq!(buttons[0]["label"], "Show all");
        assert_eq!(buttons[0]["args"][1], json!([true, true, true]));
        assert_eq!(buttons[1]["label"], "Hide edges");
        assert_eq!(buttons[1]["args"][1], json!([false, true, true]));
    }

    #[test]
    fn point_cloud_trace_comes_first() {
        let options = SceneOptions {
            show_point_clouds: true,
            ..Default::default()
        };
        let figure = build_figure(&test_map(), &options);
        assert_eq!(
            trace_names(&figure),
            ["Point cloud", "Edges", "Waypoints", "Fiducials"]
        );
    }

    #[test]
    fn edge_segments_are_null_separated() {
        let figure = build_figure(&test_map(), &SceneOptions::default());
        let edges = &figure["data"][0];
        let xs = edges["x"].as_array().unwrap();
        // One segment: from, to, null.
        assert_eq!(xs.len(), 3);
        assert!(xs[2].is_null());
    }

    #[test]
    fn highlight_moves_waypoint_to_labeled_trace() {
        let options = SceneOptions {
            highlights: vec!["AV".to_string()],
            ..Default::default()
        };
        let figure = build_figure(&test_map(), &options);
        let names = trace_names(&figure);
        assert!(names.contains(&"Highlighted".to_string()));

        let data = figure["data"].as_array().unwrap();
        let highlighted = data.iter().find(|t| t["name"] == "Highlighted").unwrap();
        assert_eq!(highlighted["mode"], "markers+text");
        assert_eq!(highlighted["x"].as_array().unwrap().len(), 1);
        let regular = data.iter().find(|t| t["name"] == "Waypoints").unwrap();
        assert_eq!(regular["x"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn highlight_matches_annotation_name_case_insensitively() {
        let options = SceneOptions {
            highlights: vec!["AULA".to_string()],
            ..Default::default()
        };
        let figure = build_figure(&test_map(), &options);
        assert!(trace_names(&figure).contains(&"Highlighted".to_string()));
    }

    #[test]
    fn fiducials_can_be_hidden() {
        let options = SceneOptions {
            show_fiducials: false,
            ..Default::default()
        };
        let figure = build_figure(&test_map(), &options);
        assert_eq!(trace_names(&figure), ["Edges", "Waypoints"]);
    }

    #[test]
    fn edges_can_be_hidden() {
        let options = SceneOptions {
            show_edges: false,
            ..Default::default()
        };
        let figure = build_figure(&test_map(), &options);
        assert!(!trace_names(&figure).contains(&"Edges".to_string()));
    }

    #[test]
    fn anchored_figure_uses_anchor_positions() {
        let mut map = test_map();
        map.graph.anchors = vec![Anchor {
            waypoint: "aula-vast-001".into(),
            seed_tform_waypoint: translation(10.0, 0.0, 0.0),
        }];
        let options = SceneOptions {
            use_anchoring: true,
            show_edges: false,
            show_fiducials: false,
            ..Default::default()
        };
        let figure = build_figure(&map, &options);
        let data = figure["data"].as_array().unwrap();
        // Only the anchored waypoint is positioned.
        assert_eq!(data[0]["x"].as_array().unwrap().len(), 1);
        assert_eq!(data[0]["x"][0], 10.0);
    }
}
