//! In-process vector store
//!
//! Brute-force cosine ranking over insertion-ordered rows. Used for local
//! development, the seed corpus and tests.

use super::{Collection, Filter, StoredObject, VectorStore};
use crate::embeddings::cosine_similarity;
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

struct Entry {
    object: StoredObject,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Fraction of query tokens that appear in the row's text properties
fn keyword_score(query: &str, object: &StoredObject) -> f32 {
    let wanted: HashSet<String> = tokens(query).collect();
    if wanted.is_empty() {
        return 0.0;
    }

    let mut present = HashSet::new();
    for value in object.properties.values() {
        match value {
            Value::String(s) => present.extend(tokens(s)),
            Value::Array(items) => {
                for s in items.iter().filter_map(Value::as_str) {
                    present.extend(tokens(s));
                }
            }
            _ => {}
        }
    }

    wanted.iter().filter(|t| present.contains(*t)).count() as f32 / wanted.len() as f32
}

/// Highest score first; equal scores keep insertion order
fn ranked<F>(entries: &[Entry], limit: usize, score: F) -> Vec<StoredObject>
where
    F: Fn(&Entry) -> f32,
{
    let mut scored: Vec<(f32, &Entry)> = entries.iter().map(|e| (score(e), e)).collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(s, e)| StoredObject {
            score: Some(s),
            ..e.object.clone()
        })
        .collect()
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn filter_query(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.object.properties)))
            .take(limit)
            .map(|e| e.object.clone())
            .collect())
    }

    async fn vector_query(
        &self,
        collection: Collection,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        Ok(ranked(entries, limit, |e| cosine_similarity(vector, &e.vector)))
    }

    async fn hybrid_query(
        &self,
        collection: Collection,
        text: &str,
        vector: &[f32],
        limit: usize,
        alpha: f32,
    ) -> Result<Vec<StoredObject>> {
        let alpha = alpha.clamp(0.0, 1.0);
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        Ok(ranked(entries, limit, |e| {
            alpha * cosine_similarity(vector, &e.vector)
                + (1.0 - alpha) * keyword_score(text, &e.object)
        }))
    }

    async fn insert(
        &self,
        collection: Collection,
        mut object: StoredObject,
        vector: Vec<f32>,
    ) -> Result<String> {
        if object.id.is_empty() {
            object.id = Uuid::new_v4().to_string();
        }
        object.score = None;
        let id = object.id.clone();

        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection).or_default();
        match entries.iter_mut().find(|e| e.object.id == id) {
            Some(existing) => {
                existing.object = object;
                existing.vector = vector;
            }
            None => entries.push(Entry { object, vector }),
        }

        Ok(id)
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn object(id: &str, value: Value) -> StoredObject {
        let properties: Map<String, Value> = value.as_object().cloned().unwrap();
        StoredObject::new(id, properties)
    }

    #[tokio::test]
    async fn test_filter_query_preserves_insertion_order() {
        let store = MemoryStore::new();
        for (id, client) in [("a", "ACME"), ("b", "Globex"), ("c", "ACME")] {
            store
                .insert(Collection::Document, object(id, json!({"client": client})), vec![1.0])
                .await
                .unwrap();
        }

        let rows = store
            .filter_query(Collection::Document, Some(&Filter::equal("client", "ACME")), 10)
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);

        let rows = store.filter_query(Collection::Document, None, 2).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_vector_query_orders_by_similarity() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Chunk, object("far", json!({})), vec![0.0, 1.0])
            .await
            .unwrap();
        store
            .insert(Collection::Chunk, object("near", json!({})), vec![1.0, 0.1])
            .await
            .unwrap();

        let rows = store
            .vector_query(Collection::Chunk, &[1.0, 0.0], 5)
            .await
            .unwrap();
        assert_eq!(rows[0].id, "near");
        assert_eq!(rows[1].id, "far");
        assert!(rows[0].score.unwrap() > rows[1].score.unwrap());
    }

    #[tokio::test]
    async fn test_hybrid_query_uses_keywords() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Chunk, object("x", json!({"content": "risk register"})), vec![1.0, 0.0])
            .await
            .unwrap();
        store
            .insert(Collection::Chunk, object("y", json!({"content": "timeline"})), vec![1.0, 0.0])
            .await
            .unwrap();

        let rows = store
            .hybrid_query(Collection::Chunk, "timeline", &[1.0, 0.0], 1, 0.5)
            .await
            .unwrap();
        assert_eq!(rows[0].id, "y");
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_counts() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Document, StoredObject::default(), vec![])
            .await
            .unwrap();
        assert!(!id.is_empty());
        assert_eq!(store.count(Collection::Document).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Chunk).await.unwrap(), 0);
    }
}
