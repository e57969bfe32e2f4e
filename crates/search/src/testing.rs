//! Shared fixtures for retrieval tests

use crate::retrieval::RetrievalEngine;
use async_trait::async_trait;
use draftforge_common::config::RetrievalConfig;
use draftforge_common::embeddings::{Embedder, HashingEmbedder};
use draftforge_common::errors::{AppError, Result};
use draftforge_common::models::{Chunk, Document};
use draftforge_common::store::{Collection, Filter, MemoryStore, StoredObject, VectorStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const DIMENSION: usize = 1024;

fn document(id: &str, title: &str, client: &str, kind: &str, summary: &str, keywords: &[&str], sector: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        document_type: kind.to_string(),
        summary: summary.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        sector: vec![sector.to_string()],
        client: client.to_string(),
        budget: 0.0,
        date: "2024-01-01".to_string(),
    }
}

/// Four documents (three with chunks) plus one orphan chunk
pub(crate) async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let embedder = HashingEmbedder::new(DIMENSION);

    let documents = [
        document("doc-fiber", "Fiber rollout", "ACME", "proposal", "backbone network deployment", &["fiber", "backbone"], "telecom"),
        document("doc-solar", "Solar farm", "ACME", "proposal", "photovoltaic panels installation", &["solar", "photovoltaic"], "energy"),
        document("doc-audit", "Payroll audit", "Globex", "report", "salary compliance review", &["payroll", "audit"], "finance"),
        document("doc-bridge", "Bridge study", "Initech", "study", "suspension cable inspection", &["bridge", "suspension"], "civil"),
    ];
    for doc in &documents {
        let vector = embedder.embed(&doc.embedding_text()).await.unwrap();
        store
            .insert(Collection::Document, StoredObject::new(doc.id.clone(), doc.to_properties()), vector)
            .await
            .unwrap();
    }

    let chunks = [
        ("c-fiber-1", Some("doc-fiber"), "trench digging schedule for fiber ducts"),
        ("c-fiber-2", Some("doc-fiber"), "splicing teams and fiber testing schedule"),
        ("c-solar-1", Some("doc-solar"), "panel mounting schedule and inverter wiring"),
        ("c-audit-1", Some("doc-audit"), "payroll sampling schedule for auditors"),
        ("c-orphan", None, "generic schedule template"),
    ];
    for (index, (id, owner, content)) in chunks.iter().enumerate() {
        let chunk = Chunk {
            id: id.to_string(),
            index: index as u32,
            content: content.to_string(),
            page: 1,
            document_id: None,
        };
        let mut object = StoredObject::new(*id, chunk.to_properties());
        if let Some(owner) = owner {
            object = object.with_document_ref(*owner);
        }
        let vector = embedder.embed(content).await.unwrap();
        store.insert(Collection::Chunk, object, vector).await.unwrap();
    }

    store
}

pub(crate) fn engine_with(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> RetrievalEngine {
    RetrievalEngine::new(store, embedder, RetrievalConfig::default())
}

/// Hashing embedder that counts calls
pub(crate) struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub(crate) fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(DIMENSION),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }

    fn model_name(&self) -> &str {
        "counting"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Embedder whose provider is down
pub(crate) struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::EmbeddingError {
            message: "provider unavailable".to_string(),
        })
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AppError::EmbeddingError {
            message: "provider unavailable".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Which store calls misbehave
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Failure {
    /// Every call errors
    All,
    /// Filtered fetches error, unfiltered ones succeed
    FilteredQueries,
    /// Nearest-neighbor queries on one collection error
    Vectors(Collection),
    /// Nearest-neighbor queries on one collection hang
    Stall(Collection),
    /// Hybrid queries error
    Hybrid,
}

/// Store wrapper that injects failures
pub(crate) struct FlakyStore {
    inner: Arc<dyn VectorStore>,
    failure: Failure,
}

impl FlakyStore {
    pub(crate) fn new(inner: Arc<dyn VectorStore>, failure: Failure) -> Self {
        Self { inner, failure }
    }
}

fn down() -> AppError {
    AppError::StoreError {
        message: "store unavailable".to_string(),
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn filter_query(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        match self.failure {
            Failure::All => Err(down()),
            Failure::FilteredQueries if filter.is_some() => Err(down()),
            _ => self.inner.filter_query(collection, filter, limit).await,
        }
    }

    async fn vector_query(
        &self,
        collection: Collection,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        match self.failure {
            Failure::All => Err(down()),
            Failure::Vectors(c) if c == collection => Err(down()),
            Failure::Stall(c) if c == collection => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(down())
            }
            _ => self.inner.vector_query(collection, vector, limit).await,
        }
    }

    async fn hybrid_query(
        &self,
        collection: Collection,
        text: &str,
        vector: &[f32],
        limit: usize,
        alpha: f32,
    ) -> Result<Vec<StoredObject>> {
        match self.failure {
            Failure::All | Failure::Hybrid => Err(down()),
            _ => self.inner.hybrid_query(collection, text, vector, limit, alpha).await,
        }
    }

    async fn insert(
        &self,
        collection: Collection,
        object: StoredObject,
        vector: Vec<f32>,
    ) -> Result<String> {
        match self.failure {
            Failure::All => Err(down()),
            _ => self.inner.insert(collection, object, vector).await,
        }
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        match self.failure {
            Failure::All => Err(down()),
            _ => self.inner.count(collection).await,
        }
    }
}
