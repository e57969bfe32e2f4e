//! Vector collection store contract
//!
//! The corpus lives in two collections, `Document` and `Chunk`. Chunk rows
//! carry a reference to their owning document. Stores support property
//! equality filters, nearest-neighbor queries and hybrid keyword+vector
//! queries; the index structure behind them is the store's business.

mod memory;
mod weaviate;

pub use memory::MemoryStore;
pub use weaviate::WeaviateStore;

use crate::config::StoreConfig;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Collections known to the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Document,
    Chunk,
}

impl Collection {
    /// Class name as stored upstream
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Document => "Document",
            Collection::Chunk => "Chunk",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A row returned by (or written to) a store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredObject {
    pub id: String,
    pub properties: Map<String, Value>,
    /// Owning document id, for chunk rows that carry a resolvable reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ref: Option<String>,
    /// Query-dependent relevance (higher is closer); `None` for plain fetches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl StoredObject {
    pub fn new(id: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            properties,
            document_ref: None,
            score: None,
        }
    }

    pub fn with_document_ref(mut self, document_id: impl Into<String>) -> Self {
        self.document_ref = Some(document_id.into());
        self
    }
}

/// Property filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Property equals the text value. For list-valued properties, any
    /// element equal to the value matches.
    Equal { property: String, value: String },
    /// Any sub-filter matches (OR)
    Any(Vec<Filter>),
    /// Every sub-filter matches (AND)
    All(Vec<Filter>),
}

impl Filter {
    pub fn equal(property: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equal {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Evaluate the filter against a row's properties in-process
    pub fn matches(&self, properties: &Map<String, Value>) -> bool {
        match self {
            Filter::Equal { property, value } => match properties.get(property) {
                Some(Value::String(s)) => s == value,
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| item.as_str() == Some(value.as_str())),
                Some(Value::Number(n)) => n.to_string() == *value,
                Some(Value::Bool(b)) => b.to_string() == *value,
                _ => false,
            },
            Filter::Any(filters) => filters.iter().any(|f| f.matches(properties)),
            Filter::All(filters) => filters.iter().all(|f| f.matches(properties)),
        }
    }
}

/// Vector collection store
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fetch up to `limit` rows, optionally restricted by a property filter
    async fn filter_query(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredObject>>;

    /// Nearest-neighbor query over the whole collection, closest first
    async fn vector_query(
        &self,
        collection: Collection,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoredObject>>;

    /// Blend of keyword and vector relevance; `alpha = 1.0` is pure vector
    async fn hybrid_query(
        &self,
        collection: Collection,
        text: &str,
        vector: &[f32],
        limit: usize,
        alpha: f32,
    ) -> Result<Vec<StoredObject>>;

    /// Insert a row with its embedding, returning the stored id
    async fn insert(
        &self,
        collection: Collection,
        object: StoredObject,
        vector: Vec<f32>,
    ) -> Result<String>;

    /// Number of rows in a collection
    async fn count(&self, collection: Collection) -> Result<usize>;
}

/// Create a store based on configuration
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.provider.as_str() {
        "weaviate" => Ok(Arc::new(WeaviateStore::new(config)?)),
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => {
            tracing::warn!(provider = other, "Unknown store provider, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_equal_on_text_and_list() {
        let row = props(json!({
            "client": "ACME",
            "sector": ["energy", "transport"],
            "budget": 1200
        }));

        assert!(Filter::equal("client", "ACME").matches(&row));
        assert!(!Filter::equal("client", "acme").matches(&row));
        assert!(Filter::equal("sector", "transport").matches(&row));
        assert!(Filter::equal("budget", "1200").matches(&row));
        assert!(!Filter::equal("missing", "x").matches(&row));
    }

    #[test]
    fn test_or_within_and_across() {
        let row = props(json!({"client": "ACME", "document_type": "proposal"}));

        let filter = Filter::All(vec![
            Filter::Any(vec![
                Filter::equal("client", "Globex"),
                Filter::equal("client", "ACME"),
            ]),
            Filter::Any(vec![Filter::equal("document_type", "proposal")]),
        ]);
        assert!(filter.matches(&row));

        let filter = Filter::All(vec![
            Filter::Any(vec![Filter::equal("client", "ACME")]),
            Filter::Any(vec![Filter::equal("document_type", "report")]),
        ]);
        assert!(!filter.matches(&row));
    }

    #[test]
    fn test_create_store_defaults_to_memory() {
        let config = StoreConfig::default();
        tokio_test::assert_ok!(create_store(&config));
    }
}
