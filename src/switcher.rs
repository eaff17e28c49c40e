use crate::config::SwitcherConfig;
use crate::layer::escape_html;
use crate::map::MapView;
use crate::schema::Schema;
use std::fmt::Write;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum SwitchError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
    #[error("this switcher group always keeps one layer visible")]
    SelectionRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub categories: Vec<String>,
    pub active: Option<String>,
    /// Whether the group may be left with nothing selected.
    pub allow_none: bool,
}

/// Owns which category layers are visible and keeps the map in step.
#[derive(Debug, Clone)]
pub struct LayerSwitcher {
    groups: Vec<Group>,
}

impl LayerSwitcher {
    /// Single mode puts every schema category in one unnamed group.
    pub fn new(config: &SwitcherConfig, schema: &Schema) -> Self {
        match config {
            SwitcherConfig::Single { default } => Self {
                groups: vec![Group {
                    name: String::new(),
                    categories: schema.categories.iter().map(|c| c.code.clone()).collect(),
                    active: Some(default.clone()),
                    allow_none: false,
                }],
            },
            SwitcherConfig::Grouped { groups } => Self {
                groups: groups
                    .iter()
                    .map(|g| Group {
                        name: g.name.clone(),
                        categories: g.categories.clone(),
                        active: g.default.clone(),
                        allow_none: g.default.is_none(),
                    })
                    .collect(),
            },
        }
    }

    /// Attaches the initially active layers.
    pub fn init(&self, map: &mut MapView) {
        for code in self.active() {
            map.attach(code);
        }
    }

    pub fn active(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter_map(|g| g.active.as_deref())
            .collect()
    }

    pub fn group_of(&self, code: &str) -> Option<&Group> {
        self.groups
            .iter()
            .find(|g| g.categories.iter().any(|c| c == code))
    }

    /// Makes `code` the active layer of its group, detaching whatever that
    /// group showed before. Other groups are untouched.
    pub fn select(&mut self, map: &mut MapView, code: &str) -> Result<(), SwitchError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.categories.iter().any(|c| c == code))
            .ok_or_else(|| SwitchError::UnknownCategory(code.to_string()))?;

        if group.active.as_deref() == Some(code) {
            return Ok(());
        }
        if let Some(previous) = group.active.take() {
            map.detach(&previous);
        }
        map.attach(code);
        group.active = Some(code.to_string());
        info!(layer = code, group = %group.name, "Layer selected");
        Ok(())
    }

    /// Leaves a group with no visible layer. Only groups without a default
    /// allow this.
    pub fn clear(&mut self, map: &mut MapView, group_name: &str) -> Result<(), SwitchError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.name == group_name)
            .ok_or_else(|| SwitchError::UnknownGroup(group_name.to_string()))?;
        if !group.allow_none {
            return Err(SwitchError::SelectionRequired);
        }
        if let Some(previous) = group.active.take() {
            map.detach(&previous);
        }
        Ok(())
    }

    /// Radio-group markup for the sidebar. One radio set per group; groups
    /// that may be empty get a "None" choice.
    pub fn render_control(&self, schema: &Schema, sidebar_id: &str) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<div class=\"layer-control\" data-sidebar=\"{}\">",
            escape_html(sidebar_id)
        );
        for (index, group) in self.groups.iter().enumerate() {
            html.push_str("<fieldset>");
            if !group.name.is_empty() {
                let _ = write!(html, "<legend>{}</legend>", escape_html(&group.name));
            }
            let input_name = format!("layer-group-{}", index);
            if group.allow_none {
                let checked = if group.active.is_none() { " checked" } else { "" };
                let _ = write!(
                    html,
                    "<label><input type=\"radio\" name=\"{}\" value=\"\" data-group=\"{}\"{}> None</label>",
                    input_name,
                    escape_html(&group.name),
                    checked
                );
            }
            for code in &group.categories {
                let title = schema.category(code).map_or(code.as_str(), |c| c.title.as_str());
                let checked = if group.active.as_deref() == Some(code.as_str()) {
                    " checked"
                } else {
                    ""
                };
                let _ = write!(
                    html,
                    "<label><input type=\"radio\" name=\"{}\" value=\"{}\" data-group=\"{}\"{}> {}</label>",
                    input_name,
                    escape_html(code),
                    escape_html(&group.name),
                    checked,
                    escape_html(title)
                );
            }
            html.push_str("</fieldset>");
        }
        html.push_str("</div>");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupConfig;

    fn single() -> LayerSwitcher {
        LayerSwitcher::new(
            &SwitcherConfig::Single {
                default: "IZ".into(),
            },
            &Schema::housing_policy(),
        )
    }

    fn grouped() -> LayerSwitcher {
        let group = |name: &str, categories: &[&str], default: Option<&str>| GroupConfig {
            name: name.into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            default: default.map(str::to_string),
        };
        LayerSwitcher::new(
            &SwitcherConfig::Grouped {
                groups: vec![
                    group("Protection", &["RS", "JCE", "CC"], Some("RS")),
                    group("Production", &["IZ", "HI"], None),
                    group("Preservation", &["CLT", "OPA"], None),
                ],
            },
            &Schema::housing_policy(),
        )
    }

    #[test]
    fn single_select_keeps_exactly_one_layer() {
        let mut switcher = single();
        let mut map = MapView::default();
        switcher.init(&mut map);
        assert_eq!(map.attached(), ["IZ".to_string()]);

        switcher.select(&mut map, "CC").unwrap();
        assert_eq!(map.attached(), ["CC".to_string()]);
        assert!(!map.is_attached("IZ"));

        switcher.select(&mut map, "CC").unwrap();
        assert_eq!(map.attached().len(), 1);
        assert_eq!(switcher.active(), vec!["CC"]);
    }

    #[test]
    fn single_select_rejects_clear_and_unknown_codes() {
        let mut switcher = single();
        let mut map = MapView::default();
        switcher.init(&mut map);

        assert_eq!(
            switcher.select(&mut map, "XX"),
            Err(SwitchError::UnknownCategory("XX".into()))
        );
        assert_eq!(switcher.clear(&mut map, ""), Err(SwitchError::SelectionRequired));
        assert_eq!(map.attached(), ["IZ".to_string()]);
    }

    #[test]
    fn groups_switch_independently() {
        let mut switcher = grouped();
        let mut map = MapView::default();
        switcher.init(&mut map);
        assert_eq!(map.attached(), ["RS".to_string()]);

        switcher.select(&mut map, "CLT").unwrap();
        switcher.select(&mut map, "IZ").unwrap();
        assert_eq!(switcher.active(), vec!["RS", "IZ", "CLT"]);

        switcher.select(&mut map, "JCE").unwrap();
        assert!(!map.is_attached("RS"));
        assert!(map.is_attached("JCE"));
        assert!(map.is_attached("IZ"));
        assert!(map.is_attached("CLT"));

        switcher.select(&mut map, "OPA").unwrap();
        assert!(!map.is_attached("CLT"));
        assert_eq!(map.attached().len(), 3);
    }

    #[test]
    fn optional_groups_can_be_cleared() {
        let mut switcher = grouped();
        let mut map = MapView::default();
        switcher.init(&mut map);
        switcher.select(&mut map, "HI").unwrap();

        switcher.clear(&mut map, "Production").unwrap();
        assert!(!map.is_attached("HI"));
        assert_eq!(
            switcher.clear(&mut map, "Protection"),
            Err(SwitchError::SelectionRequired)
        );
        assert_eq!(
            switcher.clear(&mut map, "Nope"),
            Err(SwitchError::UnknownGroup("Nope".into()))
        );
    }

    #[test]
    fn control_marks_active_choices() {
        let schema = Schema::housing_policy();
        let html = grouped().render_control(&schema, "sidebar");

        assert!(html.starts_with("<div class=\"layer-control\" data-sidebar=\"sidebar\">"));
        assert!(html.contains("<legend>Protection</legend>"));
        assert!(html.contains(
            "<input type=\"radio\" name=\"layer-group-0\" value=\"RS\" data-group=\"Protection\" checked> Rent Stabilization"
        ));
        assert!(html.contains(
            "<input type=\"radio\" name=\"layer-group-1\" value=\"\" data-group=\"Production\" checked> None"
        ));
        assert!(!html.contains("name=\"layer-group-0\" value=\"\""));

        let single_html = single().render_control(&schema, "sidebar");
        assert!(!single_html.contains("<legend>"));
        assert!(single_html.contains("value=\"IZ\" data-group=\"\" checked> Inclusionary Zoning"));
    }
}
