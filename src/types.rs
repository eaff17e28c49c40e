use geojson::Feature;
use std::collections::HashMap;
use std::path::PathBuf;

/// One spreadsheet record, accessed by header name.
#[derive(Debug, Clone, Default)]
pub struct Row {
    /// Zero-based position in the sheet, used in log messages.
    pub index: usize,
    pub fields: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn name(&self) -> &str {
        self.get("name").unwrap_or("")
    }
}

/// Where a row's geometry comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryRef {
    Inline(serde_json::Value),
    Remote(String),
    File(PathBuf),
}

/// Output of the merge phase. Shared read-only by every layer.
#[derive(Debug, Clone, Default)]
pub struct MergedCollection {
    pub features: Vec<Feature>,
}

impl MergedCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.clone(),
            foreign_members: None,
        }
    }
}
