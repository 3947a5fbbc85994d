//! Waypoint identifier resolution.
//!
//! Users refer to waypoints three ways: a derived 2-character short code, the
//! annotation name given at recording time, or the full raw id.
//! [`resolve_waypoint`] dispatches between them by identifier length and
//! returns the unique underlying waypoint id.
//!
//! Short-code resolution deliberately signals "no match" and "multiple
//! matches" the same way: by echoing the input back unchanged.  Callers must
//! treat `resolved == input` for a 2-character identifier as a soft failure
//! ("could not find waypoint").  This weak signal is kept for compatibility
//! with the legacy status messages built on top of it.

use tracing::warn;
use waymark_types::{NavError, NavGraph, WaypointId};

use crate::index::{NameEntry, NameIndex};

/// Derive the 2-character short code for a waypoint id.
///
/// The code is the first character of each of the first two hyphen-separated
/// tokens, case preserved.  Ids with fewer than 3 tokens have no short code;
/// that is absence, not an error, since 2-token ids are legitimate.
///
/// ```
/// use waymark_graph::short_code;
/// use waymark_types::WaypointId;
///
/// assert_eq!(short_code(&WaypointId::from("aula-vast-xyz-123")), Some("av".to_string()));
/// assert_eq!(short_code(&WaypointId::from("short")), None);
/// ```
pub fn short_code(waypoint_id: &WaypointId) -> Option<String> {
    let tokens: Vec<&str> = waypoint_id.as_str().split('-').collect();
    if tokens.len() <= 2 {
        return None;
    }
    let mut code = String::with_capacity(2);
    code.push(tokens[0].chars().next()?);
    code.push(tokens[1].chars().next()?);
    Some(code)
}

/// Resolve a short code, annotation name, or raw id to a full waypoint id.
///
/// Exactly-2-character identifiers are treated as short codes and matched
/// case-sensitively against the whole waypoint set; anything else is looked
/// up in the annotation-name index and, failing that, assumed to already be
/// a raw waypoint id and returned unchanged.
///
/// # Errors
///
/// - [`NavError::GraphNotLoaded`] when `graph` is `None`, before any
///   resolution is attempted.
/// - [`NavError::AmbiguousName`] when the identifier names an annotation
///   used by two or more waypoints.
pub fn resolve_waypoint(
    identifier: &str,
    graph: Option<&NavGraph>,
    names: &NameIndex,
) -> Result<WaypointId, NavError> {
    let graph = graph.ok_or(NavError::GraphNotLoaded)?;

    if identifier.chars().count() == 2 {
        return Ok(resolve_short_code(identifier, graph));
    }
    resolve_annotation_or_raw_id(identifier, names)
}

/// Scan the waypoint set for ids whose short code equals `code`.
///
/// One match returns that waypoint's id.  Zero matches and multiple matches
/// both echo `code` back unchanged; the multi-match case logs a warning
/// since it usually means the map has colliding short codes.
fn resolve_short_code(code: &str, graph: &NavGraph) -> WaypointId {
    let mut matched: Option<&WaypointId> = None;
    for waypoint in &graph.waypoints {
        if short_code(&waypoint.id).as_deref() == Some(code) {
            if matched.is_some() {
                warn!(code, "short code matches multiple waypoints");
                return WaypointId::from(code);
            }
            matched = Some(&waypoint.id);
        }
    }
    matched.cloned().unwrap_or_else(|| WaypointId::from(code))
}

fn resolve_annotation_or_raw_id(
    identifier: &str,
    names: &NameIndex,
) -> Result<WaypointId, NavError> {
    match names.get(identifier) {
        Some(NameEntry::Unique(id)) => Ok(id.clone()),
        Some(NameEntry::Ambiguous) => Err(NavError::AmbiguousName(identifier.to_string())),
        // Not a known annotation: assume it is already a full waypoint id.
        None => Ok(WaypointId::from(identifier)),
    }
}
