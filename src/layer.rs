use crate::config::{PopupConfig, PopupFormat};
use crate::schema::{CategoryDef, FieldDef, Schema};
use crate::types::MergedCollection;
use geo::{Centroid, Point};
use geojson::{Feature, FeatureCollection};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;

pub const DEFAULT_FILL: &str = "#000000";

/// Leaflet path options, serialized with Leaflet's key names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub fill_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub color: String,
    pub fill_opacity: f64,
}

impl Style {
    pub fn base(fill_color: &str) -> Self {
        Self {
            fill_color: fill_color.to_string(),
            weight: 0.0,
            opacity: 1.0,
            color: "white".to_string(),
            fill_opacity: 0.8,
        }
    }

    pub fn hovered(self) -> Self {
        Self {
            color: "black".to_string(),
            weight: 0.0,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Click {
        button: MouseButton,
        /// Where the pointer was, if known. Popups fall back to the centroid.
        at: Option<Point<f64>>,
    },
    MouseOver,
    MouseOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub layer: String,
    pub feature: usize,
    pub anchor: Option<Point<f64>>,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerResponse {
    OpenPopup(Popup),
    SetStyle { feature: usize, style: Style },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    pub response: LayerResponse,
    /// Set when the map itself must not see the event.
    pub stop_propagation: bool,
}

/// One category's view over the shared merged collection.
#[derive(Debug, Clone)]
pub struct Layer {
    pub category: CategoryDef,
    base_fields: Vec<FieldDef>,
    data: Arc<MergedCollection>,
    popup: PopupConfig,
    hover_highlight: bool,
}

pub fn build_layers(
    schema: &Schema,
    data: Arc<MergedCollection>,
    popup: &PopupConfig,
    hover_highlight: bool,
) -> Vec<Layer> {
    schema
        .categories
        .iter()
        .map(|category| Layer {
            category: category.clone(),
            base_fields: schema.base_fields.clone(),
            data: Arc::clone(&data),
            popup: popup.clone(),
            hover_highlight,
        })
        .collect()
}

impl Layer {
    pub fn code(&self) -> &str {
        &self.category.code
    }

    pub fn title(&self) -> &str {
        &self.category.title
    }

    pub fn features(&self) -> &[Feature] {
        &self.data.features
    }

    /// Fill comes from the category's color property; anything missing or
    /// blank falls back to black.
    pub fn style(&self, feature: &Feature) -> Style {
        let fill = feature
            .property(&self.category.color_field)
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_FILL);
        Style::base(fill)
    }

    pub fn popup_html(&self, feature: &Feature) -> String {
        let rows = self
            .base_fields
            .iter()
            .chain(&self.category.fields)
            .map(|field| (field.label.as_str(), self.display_value(feature, &field.key)));

        let mut html = String::new();
        match self.popup.format {
            PopupFormat::Table => {
                html.push_str("<table class=\"popup-table\">");
                for (label, value) in rows {
                    let _ = write!(
                        html,
                        "<tr><td><strong>{}:</strong></td><td>{}</td></tr>",
                        label, value
                    );
                }
                html.push_str("</table>");
            }
            PopupFormat::Paragraphs => {
                for (label, value) in rows {
                    let _ = write!(html, "<p>{}: {}</p>", label, value);
                }
            }
        }
        html
    }

    fn display_value(&self, feature: &Feature, key: &str) -> String {
        let raw = match feature.property(key) {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };
        if self.popup.escape_html {
            escape_html(&raw)
        } else {
            raw
        }
    }

    /// Reacts to a pointer event on one of this layer's features.
    pub fn handle(&self, feature_index: usize, event: &PointerEvent) -> Option<Handled> {
        let feature = self.data.features.get(feature_index)?;
        match event {
            PointerEvent::Click {
                button: MouseButton::Primary,
                at,
            } => Some(Handled {
                response: LayerResponse::OpenPopup(Popup {
                    layer: self.category.code.clone(),
                    feature: feature_index,
                    anchor: at.or_else(|| centroid(feature)),
                    html: self.popup_html(feature),
                }),
                stop_propagation: true,
            }),
            PointerEvent::Click { .. } => None,
            PointerEvent::MouseOver if self.hover_highlight => Some(Handled {
                response: LayerResponse::SetStyle {
                    feature: feature_index,
                    style: self.style(feature).hovered(),
                },
                stop_propagation: false,
            }),
            PointerEvent::MouseOver => None,
            PointerEvent::MouseOut => Some(Handled {
                response: LayerResponse::SetStyle {
                    feature: feature_index,
                    style: self.style(feature),
                },
                stop_propagation: false,
            }),
        }
    }

    /// The layer as plain GeoJSON with each feature's style and popup baked
    /// into `style` and `popup` properties.
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .data
            .features
            .iter()
            .map(|feature| {
                let mut styled = feature.clone();
                let style = serde_json::to_value(self.style(feature)).unwrap_or(Value::Null);
                styled.set_property("style", style);
                styled.set_property("popup", self.popup_html(feature));
                styled
            })
            .collect();
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

pub fn centroid(feature: &Feature) -> Option<Point<f64>> {
    let geometry = feature.geometry.as_ref()?;
    let geometry: geo::Geometry<f64> = geometry.value.clone().try_into().ok()?;
    geometry.centroid()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(props: Value) -> Feature {
        let value = json!({
            "type": "Feature",
            "properties": props,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
            }
        });
        Feature::try_from(value).unwrap()
    }

    fn layers_for(features: Vec<Feature>, popup: PopupConfig, hover: bool) -> Vec<Layer> {
        let data = Arc::new(MergedCollection { features });
        build_layers(&Schema::housing_policy(), data, &popup, hover)
    }

    fn layer<'a>(layers: &'a [Layer], code: &str) -> &'a Layer {
        layers.iter().find(|l| l.code() == code).unwrap()
    }

    #[test]
    fn one_layer_per_category_sharing_the_data() {
        let layers = layers_for(vec![feature(json!({}))], PopupConfig::default(), false);
        assert_eq!(layers.len(), Schema::housing_policy().categories.len());
        assert!(Arc::ptr_eq(&layers[0].data, &layers[1].data));
    }

    #[test]
    fn style_uses_category_color_with_black_fallback() {
        let layers = layers_for(vec![], PopupConfig::default(), false);
        let f = feature(json!({ "RScolor": "#ff0000", "JCEcolor": "", "CCcolor": null }));

        let rs = layer(&layers, "RS").style(&f);
        assert_eq!(rs.fill_color, "#ff0000");
        assert_eq!(rs.weight, 0.0);
        assert_eq!(rs.opacity, 1.0);
        assert_eq!(rs.color, "white");
        assert_eq!(rs.fill_opacity, 0.8);

        assert_eq!(layer(&layers, "JCE").style(&f).fill_color, DEFAULT_FILL);
        assert_eq!(layer(&layers, "CC").style(&f).fill_color, DEFAULT_FILL);
        assert_eq!(layer(&layers, "IZ").style(&f).fill_color, DEFAULT_FILL);
    }

    #[test]
    fn table_popup_lists_fields_in_order() {
        let layers = layers_for(vec![], PopupConfig::default(), false);
        let f = feature(json!({ "name": "Area A", "description": null, "RSscore": "3" }));
        let html = layer(&layers, "RS").popup_html(&f);

        assert!(html.starts_with("<table class=\"popup-table\">"));
        assert!(html.contains("<tr><td><strong>Name:</strong></td><td>Area A</td></tr>"));
        assert!(html.contains("<tr><td><strong>Description:</strong></td><td></td></tr>"));
        assert!(html.contains("<tr><td><strong>Score:</strong></td><td>3</td></tr>"));
        let name = html.find("Name:").unwrap();
        let score = html.find("Score:").unwrap();
        let just_cause = html.find("Just Cause:").unwrap();
        assert!(name < score && score < just_cause);
        assert!(!html.contains("RScolor"));
    }

    #[test]
    fn paragraph_popup_and_escaping() {
        let escaped = PopupConfig {
            format: PopupFormat::Paragraphs,
            escape_html: true,
        };
        let layers = layers_for(vec![], escaped.clone(), false);
        let f = feature(json!({ "name": "<b>A & B</b>", "CLTscore": "2" }));
        let html = layer(&layers, "CLT").popup_html(&f);
        assert!(html.starts_with("<p>Name: &lt;b&gt;A &amp; B&lt;/b&gt;</p>"));
        assert!(html.contains("<p>Score: 2</p>"));

        let raw = PopupConfig {
            escape_html: false,
            ..escaped
        };
        let layers = layers_for(vec![], raw, false);
        let html = layer(&layers, "CLT").popup_html(&f);
        assert!(html.starts_with("<p>Name: <b>A & B</b></p>"));
    }

    #[test]
    fn primary_click_opens_popup_and_stops_propagation() {
        let layers = layers_for(vec![feature(json!({ "name": "A" }))], PopupConfig::default(), false);
        let rs = layer(&layers, "RS");

        let handled = rs
            .handle(
                0,
                &PointerEvent::Click {
                    button: MouseButton::Primary,
                    at: None,
                },
            )
            .unwrap();
        assert!(handled.stop_propagation);
        match handled.response {
            LayerResponse::OpenPopup(popup) => {
                assert_eq!(popup.layer, "RS");
                assert_eq!(popup.feature, 0);
                assert_eq!(popup.anchor, Some(Point::new(1.0, 1.0)));
                assert!(popup.html.contains("A"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let secondary = PointerEvent::Click {
            button: MouseButton::Secondary,
            at: None,
        };
        assert_eq!(rs.handle(0, &secondary), None);
        assert_eq!(rs.handle(5, &PointerEvent::MouseOut), None);
    }

    #[test]
    fn hover_highlight_and_reset() {
        let f = feature(json!({ "RScolor": "#00ff00" }));
        let plain = layers_for(vec![f.clone()], PopupConfig::default(), false);
        assert_eq!(layer(&plain, "RS").handle(0, &PointerEvent::MouseOver), None);

        let rich = layers_for(vec![f], PopupConfig::default(), true);
        let rs = layer(&rich, "RS");
        let over = rs.handle(0, &PointerEvent::MouseOver).unwrap();
        let out = rs.handle(0, &PointerEvent::MouseOut).unwrap();
        match (over.response, out.response) {
            (
                LayerResponse::SetStyle { style: hover, .. },
                LayerResponse::SetStyle { style: base, .. },
            ) => {
                assert_eq!(hover.color, "black");
                assert_eq!(hover.fill_color, "#00ff00");
                assert_eq!(base, Style::base("#00ff00"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn geojson_export_bakes_style_and_popup() {
        let layers = layers_for(
            vec![feature(json!({ "name": "A", "IZcolor": "#123456" }))],
            PopupConfig::default(),
            false,
        );
        let fc = layer(&layers, "IZ").to_geojson();
        let f = &fc.features[0];
        assert_eq!(f.property("style").unwrap()["fillColor"], json!("#123456"));
        assert!(f.property("popup").unwrap().as_str().unwrap().contains("A"));
        assert_eq!(f.property("name"), Some(&json!("A")));
    }
}
