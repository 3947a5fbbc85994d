//! Standalone HTML export for figure documents.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::info;
use waymark_types::NavError;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Write `figure` to `path` as a self-contained HTML page.  The plot library
/// loads from CDN, so the page needs network access but no local install.
pub fn export_html(figure: &Value, title: &str, path: &Path) -> Result<(), NavError> {
    let data = serde_json::to_string(&figure["data"])
        .map_err(|e| NavError::MapLoad(format!("figure serialization failed: {e}")))?;
    let layout = serde_json::to_string(&figure["layout"])
        .map_err(|e| NavError::MapLoad(format!("figure serialization failed: {e}")))?;

    let page = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
<style>html, body, #map {{ margin: 0; height: 100%; }}</style>
</head>
<body>
<div id="map"></div>
<script>
Plotly.newPlot("map", {data}, {layout});
</script>
</body>
</html>
"#
    );

    fs::write(path, &page)
        .map_err(|e| NavError::MapLoad(format!("cannot write {}: {e}", path.display())))?;
    info!(path = %path.display(), bytes = page.len(), "exported HTML map view");
    Ok(())
}
