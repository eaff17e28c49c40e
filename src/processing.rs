use crate::config::InputConfig;
use crate::data::{geometry_ref, is_included};
use crate::error::SourceError;
use crate::geometry::normalize;
use crate::schema::Schema;
use crate::source::GeometrySource;
use crate::types::{MergedCollection, Row};
use futures::future::join_all;
use geojson::{Feature, JsonObject};
use serde_json::Value;
use tracing::{info, warn};

/// Resolves every included row's geometry and stamps the row's attributes on
/// each resulting feature.
///
/// All rows are resolved concurrently and the function returns only once
/// every one has settled. A failing row is logged and contributes nothing.
/// Features are kept in row order whatever order the fetches finish in.
pub async fn merge_rows<S: GeometrySource>(
    rows: &[Row],
    input: &InputConfig,
    schema: &Schema,
    source: &S,
) -> MergedCollection {
    let included: Vec<&Row> = rows.iter().filter(|row| is_included(row, input)).collect();
    info!(included = included.len(), total = rows.len(), "Resolving row geometry");

    let pending = included.into_iter().map(|row| async move {
        let result = resolve_row(row, &input.geometry_columns, source).await;
        (row, result)
    });
    let settled = join_all(pending).await;

    let mut merged = MergedCollection::default();
    let mut failed = 0usize;
    for (row, result) in settled {
        match result {
            Ok(features) => {
                for mut feature in features {
                    feature.properties = Some(stamp(schema, row));
                    merged.features.push(feature);
                }
            }
            Err(err) => {
                failed += 1;
                warn!(row = row.index, name = row.name(), error = %err, "Skipping row");
            }
        }
    }

    info!(features = merged.len(), failed, "Merge complete");
    merged
}

async fn resolve_row<S: GeometrySource>(
    row: &Row,
    columns: &[String],
    source: &S,
) -> Result<Vec<Feature>, SourceError> {
    let reference = geometry_ref(row, columns)?;
    let value = source.fetch(&reference).await?;
    Ok(normalize(value)?)
}

/// Fresh property map holding every schema field. Columns missing from the
/// row are stamped as `null` so every feature has the same keys.
pub fn stamp(schema: &Schema, row: &Row) -> JsonObject {
    schema
        .stamped_fields()
        .into_iter()
        .map(|(key, column)| {
            let value = row
                .get(column)
                .map_or(Value::Null, |v| Value::String(v.to_string()));
            (key.to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeometryRef;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves canned documents for remote references, with an optional delay
    /// per URL, and counts completed fetches.
    #[derive(Default)]
    struct MemorySource {
        documents: HashMap<String, Value>,
        delays: HashMap<String, u64>,
        completed: AtomicUsize,
    }

    impl MemorySource {
        fn with(mut self, url: &str, doc: Value) -> Self {
            self.documents.insert(url.to_string(), doc);
            self
        }

        fn delayed(mut self, url: &str, millis: u64) -> Self {
            self.delays.insert(url.to_string(), millis);
            self
        }
    }

    impl GeometrySource for MemorySource {
        async fn fetch(&self, reference: &GeometryRef) -> Result<Value, SourceError> {
            let result = match reference {
                GeometryRef::Inline(value) => Ok(value.clone()),
                GeometryRef::Remote(url) => {
                    if let Some(ms) = self.delays.get(url) {
                        tokio::time::sleep(Duration::from_millis(*ms)).await;
                    }
                    self.documents
                        .get(url)
                        .cloned()
                        .ok_or_else(|| SourceError::Unavailable(url.clone()))
                }
                GeometryRef::File(path) => Err(SourceError::Unavailable(path.display().to_string())),
            };
            self.completed.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    fn input() -> InputConfig {
        InputConfig {
            sheet: "rows.csv".into(),
            include_column: "include".into(),
            include_value: "y".into(),
            geometry_columns: vec!["geometry".into()],
        }
    }

    fn row(index: usize, pairs: &[(&str, &str)]) -> Row {
        Row {
            index,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn polygon_collection() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "source": "county" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
                }
            }]
        })
    }

    #[tokio::test]
    async fn remote_row_is_stamped_with_full_schema() {
        let schema = Schema::housing_policy();
        let source = MemorySource::default().with("https://x/a.geojson", polygon_collection());
        let rows = vec![row(
            0,
            &[
                ("include", "y"),
                ("name", "Area A"),
                ("geometry", "https://x/a.geojson"),
                ("RSscore", "3"),
                ("RScolor", "#ff0000"),
            ],
        )];

        let merged = merge_rows(&rows, &input(), &schema, &source).await;

        assert_eq!(merged.len(), 1);
        let feature = &merged.features[0];
        assert!(matches!(
            feature.geometry.as_ref().unwrap().value,
            geojson::Value::Polygon(_)
        ));
        assert_eq!(feature.property("name"), Some(&json!("Area A")));
        assert_eq!(feature.property("RSscore"), Some(&json!("3")));
        assert_eq!(feature.property("RScolor"), Some(&json!("#ff0000")));
        assert_eq!(feature.property("description"), Some(&Value::Null));
        assert_eq!(feature.property("source"), None);

        let props = feature.properties.as_ref().unwrap();
        for (key, _) in schema.stamped_fields() {
            assert!(props.contains_key(key), "missing {}", key);
        }
        assert_eq!(props.len(), schema.stamped_fields().len());
    }

    #[tokio::test]
    async fn excluded_rows_contribute_nothing() {
        let rows = vec![
            row(0, &[("include", "n"), ("geometry", "[1, 2]")]),
            row(1, &[("include", ""), ("geometry", "[1, 2]")]),
            row(2, &[("geometry", "[1, 2]")]),
        ];
        let source = MemorySource::default();
        let merged = merge_rows(&rows, &input(), &Schema::housing_policy(), &source).await;
        assert!(merged.is_empty());
        assert_eq!(source.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_fetch_only_drops_its_own_row() {
        let source = MemorySource::default()
            .with("https://x/a.geojson", polygon_collection())
            .with("https://x/c.geojson", polygon_collection())
            .with("https://x/bad.geojson", json!({ "type": "FeatureCollection" }))
            .delayed("https://x/a.geojson", 30);
        let rows = vec![
            row(0, &[("include", "y"), ("name", "A"), ("geometry", "https://x/a.geojson")]),
            row(1, &[("include", "y"), ("name", "B"), ("geometry", "https://x/missing.geojson")]),
            row(2, &[("include", "y"), ("name", "C"), ("geometry", "https://x/c.geojson")]),
            row(3, &[("include", "y"), ("name", "D"), ("geometry", "https://x/bad.geojson")]),
        ];

        let merged = merge_rows(&rows, &input(), &Schema::housing_policy(), &source).await;

        assert_eq!(source.completed.load(Ordering::SeqCst), 4);
        let names: Vec<_> = merged
            .features
            .iter()
            .map(|f| f.property("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![json!("A"), json!("C")]);
    }

    #[tokio::test]
    async fn multi_feature_sources_stamp_every_feature() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": { "type": "Point", "coordinates": [0, 0] } },
                { "type": "Feature", "properties": {}, "geometry": { "type": "Point", "coordinates": [1, 1] } }
            ]
        });
        let source = MemorySource::default().with("https://x/pts.geojson", doc);
        let rows = vec![
            row(0, &[("include", "y"), ("name", "Pts"), ("geometry", "https://x/pts.geojson")]),
            row(1, &[("include", "y"), ("name", "Inline"), ("geometry", "[-121.8, 37.0]")]),
        ];

        let merged = merge_rows(&rows, &input(), &Schema::housing_policy(), &source).await;

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.features[1].property("name"), Some(&json!("Pts")));
        assert_eq!(merged.features[2].property("name"), Some(&json!("Inline")));
    }

    #[test]
    fn stamp_copies_exact_values_and_aliases() {
        let schema = Schema::housing_policy();
        let props = stamp(
            &schema,
            &row(0, &[("name", "Area"), ("JCEcover", "owner-occupied"), ("CCfees", "")]),
        );
        assert_eq!(props["name"], json!("Area"));
        assert_eq!(props["JCEexempt"], json!("owner-occupied"));
        assert_eq!(props["CCfees"], json!(""));
        assert_eq!(props["IZscore"], Value::Null);
        assert!(!props.contains_key("JCEcover"));
    }
}
