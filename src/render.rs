use crate::config::AppConfig;
use crate::html::{index_page, PageSources};
use crate::layer::Layer;
use crate::map::MapView;
use crate::switcher::LayerSwitcher;
use crate::types::MergedCollection;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Manifest entry for one layer, shared by `layers.json` and `/api/layers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub code: String,
    pub title: String,
    pub group: Option<String>,
    pub attached: bool,
    pub features: usize,
}

pub fn layer_manifest(layers: &[Layer], switcher: &LayerSwitcher, map: &MapView) -> Vec<LayerInfo> {
    layers
        .iter()
        .map(|layer| LayerInfo {
            code: layer.code().to_string(),
            title: layer.title().to_string(),
            group: switcher
                .group_of(layer.code())
                .map(|g| g.name.clone())
                .filter(|name| !name.is_empty()),
            attached: map.is_attached(layer.code()),
            features: layer.features().len(),
        })
        .collect()
}

/// Writes a self-contained static map into the configured output directory:
///
/// ```text
/// index.html
/// control.html
/// layers.json
/// merged.geojson
/// layers/{code}.geojson
/// ```
pub fn write_outputs(
    config: &AppConfig,
    merged: &MergedCollection,
    layers: &[Layer],
    switcher: &LayerSwitcher,
) -> Result<()> {
    let out_dir = config.output_dir();
    let layer_dir = out_dir.join("layers");
    fs::create_dir_all(&layer_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", layer_dir))?;

    write_json(&out_dir.join("merged.geojson"), &merged.to_geojson())?;

    layers
        .par_iter()
        .map(|layer| {
            let path = layer_dir.join(format!("{}.geojson", layer.code()));
            write_json(&path, &layer.to_geojson())?;
            info!(layer = layer.code(), features = layer.features().len(), "Wrote layer");
            Ok(())
        })
        .collect::<Result<Vec<()>>>()?;

    let mut map = MapView::default();
    switcher.init(&mut map);
    write_json(
        &out_dir.join("layers.json"),
        &layer_manifest(layers, switcher, &map),
    )?;

    let control = switcher.render_control(&config.schema, &config.map.sidebar_id);
    write_text(&out_dir.join("control.html"), &control)?;

    let page = index_page(
        &config.map,
        config.style.hover_highlight,
        &PageSources::static_files(),
    );
    write_text(&out_dir.join("index.html"), &page)?;

    info!(dir = ?out_dir, layers = layers.len(), "Output written");
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize {:?}", path))?;
    write_text(path, &json)
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
