//! Corpus models
//!
//! Documents and chunks as returned by the retrieval engine. Both are
//! read from [`StoredObject`] rows and tolerate missing or oddly typed
//! properties, since the corpus is populated by external tooling.

use crate::store::StoredObject;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A corpus document (report, proposal, study...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sector: Vec<String>,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub date: String,
}

impl Document {
    pub fn from_object(object: &StoredObject) -> Self {
        let p = &object.properties;
        Self {
            id: object.id.clone(),
            title: text(p, "title"),
            document_type: text(p, "document_type"),
            summary: text(p, "summary"),
            keywords: list(p, "keywords"),
            sector: list(p, "sector"),
            client: text(p, "client"),
            budget: p.get("budget").and_then(Value::as_f64).unwrap_or_default(),
            date: text(p, "date"),
        }
    }

    pub fn to_properties(&self) -> Map<String, Value> {
        let value = json!({
            "title": self.title,
            "document_type": self.document_type,
            "summary": self.summary,
            "keywords": self.keywords,
            "sector": self.sector,
            "client": self.client,
            "budget": self.budget,
            "date": self.date,
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Text the document vector is computed from
    pub fn embedding_text(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(std::iter::once(self.summary.as_str()))
            .chain(self.keywords.iter().map(String::as_str))
            .chain(self.sector.iter().map(String::as_str))
            .chain(std::iter::once(self.client.as_str()))
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A passage of a document's page text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub index: u32,
    pub content: String,
    pub page: u32,
    /// Owning document; `None` when the row has no resolvable reference
    pub document_id: Option<String>,
}

impl Chunk {
    pub fn from_object(object: &StoredObject) -> Self {
        let p = &object.properties;
        Self {
            id: object.id.clone(),
            index: number(p, "index"),
            content: text(p, "content"),
            page: number(p, "page"),
            document_id: object.document_ref.clone(),
        }
    }

    pub fn to_properties(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("content".to_string(), Value::String(self.content.clone()));
        map.insert("index".to_string(), Value::from(self.index));
        map.insert("page".to_string(), Value::from(self.page));
        map
    }
}

fn text(properties: &Map<String, Value>, key: &str) -> String {
    match properties.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn list(properties: &Map<String, Value>, key: &str) -> Vec<String> {
    match properties.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn number(properties: &Map<String, Value>, key: &str) -> u32 {
    properties
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_default()
}
