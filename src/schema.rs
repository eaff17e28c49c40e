use serde::{Deserialize, Serialize};

/// One stamped attribute: the property key on the feature, the label shown
/// in popups, and optionally the spreadsheet column it is read from when
/// that differs from the key.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FieldDef {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub column: Option<String>,
}

impl FieldDef {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            column: None,
        }
    }

    pub fn from_column(key: &str, label: &str, column: &str) -> Self {
        Self {
            column: Some(column.to_string()),
            ..Self::new(key, label)
        }
    }

    pub fn source_column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CategoryDef {
    /// Short code, e.g. `RS`. Used as the layer identifier.
    pub code: String,
    /// Human readable layer name shown in the switcher.
    pub title: String,
    /// Property holding the fill color for this category.
    pub color_field: String,
    /// Popup fields in display order (after the base fields).
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Schema {
    /// Fields shown at the top of every popup (`name`, `description`).
    pub base_fields: Vec<FieldDef>,
    pub categories: Vec<CategoryDef>,
}

impl Schema {
    pub fn category(&self, code: &str) -> Option<&CategoryDef> {
        self.categories.iter().find(|c| c.code == code)
    }

    /// Every property stamped onto a merged feature as `(key, source column)`,
    /// in schema order with duplicates removed.
    pub fn stamped_fields(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = Vec::new();
        for field in &self.base_fields {
            add_unique(&mut out, &field.key, field.source_column());
        }
        for category in &self.categories {
            for field in &category.fields {
                add_unique(&mut out, &field.key, field.source_column());
            }
            add_unique(&mut out, &category.color_field, &category.color_field);
        }
        out
    }

    /// The housing-policy schema used when the config file does not define one.
    pub fn housing_policy() -> Self {
        let f = FieldDef::new;
        Self {
            base_fields: vec![f("name", "Name"), f("description", "Description")],
            categories: vec![
                CategoryDef {
                    code: "IZ".into(),
                    title: "Inclusionary Zoning".into(),
                    color_field: "IZcolor".into(),
                    fields: vec![
                        f("IZscore", "Score"),
                        f("IZOrequired", "IZO Required"),
                        f("IZOsystem", "IZO System"),
                        f("IZOenhanced", "IZO Enhanced"),
                        f("IZOaffordable", "IZO Affordable"),
                        f("IZRrequired", "IZR Required"),
                        f("IZRsystem", "IZR System"),
                        f("IZRenhanced", "IZR Enhanced"),
                        f("IZRaffordable", "IZR Affordable"),
                    ],
                },
                CategoryDef {
                    code: "CC".into(),
                    title: "Condo Conversion".into(),
                    color_field: "CCcolor".into(),
                    fields: vec![
                        f("CCscore", "Score"),
                        f("CCexists", "Exists"),
                        f("CCnew", "New"),
                        f("CClimit", "Limit"),
                        f("CCfees", "Fees"),
                        f("CCreplacement", "Replacement"),
                        f("CCrelocation", "Relocation"),
                    ],
                },
                CategoryDef {
                    code: "OPA".into(),
                    title: "Opportunity to Purchase Act".into(),
                    color_field: "OPAcolor".into(),
                    fields: vec![
                        f("OPAscore", "Score"),
                        f("COPAexists", "COPA Exists"),
                        f("COPAallaff", "COPA All / Aff"),
                        f("COPAfunding", "COPA Funding"),
                        f("TOPAexists", "TOPA Exists"),
                        f("TOPAallaff", "TOPA All / Aff"),
                        f("TOPAfunding", "TOPA Funding"),
                    ],
                },
                CategoryDef {
                    code: "CLT".into(),
                    title: "Community Land Trusts".into(),
                    color_field: "CLTcolor".into(),
                    fields: vec![
                        f("CLTscore", "Score"),
                        f("CLTexists", "Exists"),
                        f("CLTportfolio", "Portfolio"),
                        f("CLTiz", "IZ"),
                        f("CLTmunicipal", "Municipal"),
                        f("CLTelement", "Element"),
                        f("CLTfunding", "Funding"),
                    ],
                },
                CategoryDef {
                    code: "JCE".into(),
                    title: "Just Cause Eviction".into(),
                    color_field: "JCEcolor".into(),
                    fields: vec![
                        f("JCEscore", "Score"),
                        f("JCEexists", "Exists"),
                        f("JCEmonths", "Months"),
                        FieldDef::from_column("JCEexempt", "Exempt", "JCEcover"),
                        f("JCEmonitoring", "Monitoring"),
                        f("JCEpenalties", "Penalties"),
                        f("JCErelocation", "Relocation"),
                        f("JCEnotice", "Notice"),
                    ],
                },
                CategoryDef {
                    code: "RS".into(),
                    title: "Rent Stabilization".into(),
                    color_field: "RScolor".into(),
                    fields: vec![
                        f("RSscore", "Score"),
                        f("RSexists", "Exists"),
                        f("RSyearcap", "Year Cap"),
                        f("RSexempt", "Exempt"),
                        f("RScondo", "Condo"),
                        f("RSjustcause", "Just Cause"),
                    ],
                },
                CategoryDef {
                    code: "HI".into(),
                    title: "Housing Impact".into(),
                    color_field: "HIcolor".into(),
                    fields: vec![f("HIscore", "Score"), f("HIexists", "Exists")],
                },
            ],
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::housing_policy()
    }
}

fn add_unique<'a>(out: &mut Vec<(&'a str, &'a str)>, key: &'a str, column: &'a str) {
    if !out.iter().any(|(k, _)| *k == key) {
        out.push((key, column));
    }
}
