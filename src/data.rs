use crate::config::{AppConfig, InputConfig};
use crate::error::SourceError;
use crate::types::{GeometryRef, Row};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub async fn load_rows(config: &AppConfig, client: &reqwest::Client) -> Result<Vec<Row>> {
    let sheet = &config.input.sheet;
    info!(%sheet, "Loading spreadsheet rows");

    let text = if is_remote(sheet) {
        client
            .get(sheet)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to download spreadsheet: {}", sheet))?
            .text()
            .await
            .with_context(|| format!("Failed to read spreadsheet body: {}", sheet))?
    } else {
        let path = config.resolve(Path::new(sheet));
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to open CSV file: {:?}", path))?
    };

    let rows = parse_rows(text.as_bytes())?;
    info!(rows = rows.len(), "Loaded spreadsheet");
    Ok(rows)
}

/// Parses CSV with a header line into rows keyed by column name. Short
/// records leave the trailing columns absent.
pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let mut rows = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Malformed CSV record {}", index + 1))?;
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(Row { index, fields });
    }
    Ok(rows)
}

pub fn is_included(row: &Row, input: &InputConfig) -> bool {
    row.get(&input.include_column) == Some(input.include_value.as_str())
}

/// Picks the first non-empty geometry column and classifies it as inline
/// JSON, a URL, or a local path.
pub fn geometry_ref(row: &Row, columns: &[String]) -> Result<GeometryRef, SourceError> {
    let raw = columns
        .iter()
        .filter_map(|c| row.get(c))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .ok_or_else(|| SourceError::MissingReference(columns.to_vec()))?;

    if raw.starts_with('{') || raw.starts_with('[') {
        debug!(row = row.index, "Inline geometry");
        return Ok(GeometryRef::Inline(serde_json::from_str(raw)?));
    }
    if is_remote(raw) {
        return Ok(GeometryRef::Remote(raw.to_string()));
    }
    Ok(GeometryRef::File(PathBuf::from(raw)))
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
