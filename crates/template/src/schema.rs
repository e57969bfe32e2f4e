//! Template schema (`{id}.json`)

use draftforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One statically declared section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Fallback content when the section was never filled
    #[serde(default)]
    pub contenu_initiale: String,
    /// Literal placeholder text in the HTML
    #[serde(default)]
    pub contenu: String,
    /// Generation instruction for this section
    #[serde(default)]
    pub ia_prompt: String,
}

/// Sections keyed by name. Non-object entries of the JSON file are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateSchema {
    sections: BTreeMap<String, SectionSpec>,
}

impl TemplateSchema {
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(entries) = value else {
            return Err(AppError::InvalidFormat {
                message: "template schema must be a JSON object".to_string(),
            });
        };

        let mut sections = BTreeMap::new();
        for (name, entry) in entries {
            if entry.is_object() {
                sections.insert(name, serde_json::from_value(entry)?);
            }
        }
        Ok(Self { sections })
    }

    pub fn get(&self, name: &str) -> Option<&SectionSpec> {
        self.sections.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SectionSpec)> {
        self.sections.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.sections.keys()
    }
}

impl FromIterator<(String, SectionSpec)> for TemplateSchema {
    fn from_iter<I: IntoIterator<Item = (String, SectionSpec)>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().collect(),
        }
    }
}
