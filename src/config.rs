use crate::schema::Schema;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub popup: PopupConfig,
    pub switcher: SwitcherConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub schema: Schema,
    /// Directory of the config file; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Published CSV export of the spreadsheet, URL or local path.
    pub sheet: String,
    #[serde(default = "default_include_column")]
    pub include_column: String,
    #[serde(default = "default_include_value")]
    pub include_value: String,
    /// Columns searched in order for the geometry reference.
    #[serde(default = "default_geometry_columns")]
    pub geometry_columns: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center: [f64; 2],
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
    pub subdomains: String,
    pub max_zoom: u8,
    pub sidebar_id: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        // Santa Cruz County on Carto Positron.
        Self {
            center: [37.06896802407835, -121.79781540900152],
            zoom: 10,
            tile_url: "https://cartodb-basemaps-{s}.global.ssl.fastly.net/light_all/{z}/{x}/{y}{r}.png"
                .to_string(),
            attribution: "&copy; <a href='http://www.openstreetmap.org/copyright'>OpenStreetMap</a> \
                          &copy; <a href='http://cartodb.com/attributions'>CartoDB</a>"
                .to_string(),
            subdomains: "abcd".to_string(),
            max_zoom: 16,
            sidebar_id: "sidebar".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StyleConfig {
    /// Outline features in black while hovered.
    pub hover_highlight: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PopupFormat {
    #[default]
    Table,
    Paragraphs,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PopupConfig {
    pub format: PopupFormat,
    pub escape_html: bool,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            format: PopupFormat::Table,
            escape_html: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SwitcherConfig {
    Single { default: String },
    Grouped { groups: Vec<GroupConfig> },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GroupConfig {
    pub name: String,
    pub categories: Vec<String>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

fn default_include_column() -> String {
    "include".to_string()
}

fn default_include_value() -> String {
    "y".to_string()
}

fn default_geometry_columns() -> Vec<String> {
    vec!["geometry".to_string(), "filePaths".to_string()]
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves a config-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }

    fn validate(&self) -> Result<()> {
        let known = |code: &str| -> Result<()> {
            self.schema
                .category(code)
                .map(|_| ())
                .ok_or_else(|| anyhow!("Switcher references unknown category '{}'", code))
        };

        match &self.switcher {
            SwitcherConfig::Single { default } => known(default)?,
            SwitcherConfig::Grouped { groups } => {
                let mut seen = HashSet::new();
                for group in groups {
                    for code in &group.categories {
                        known(code)?;
                        if !seen.insert(code.as_str()) {
                            bail!("Category '{}' appears in more than one switcher group", code);
                        }
                    }
                    if let Some(default) = &group.default {
                        if !group.categories.contains(default) {
                            bail!(
                                "Default '{}' of group '{}' is not one of its categories",
                                default,
                                group.name
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
