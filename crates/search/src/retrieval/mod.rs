//! Three-phase corpus retrieval
//!
//! 1. Exact filter: `title`/`client`/`document_type` narrow the Document
//!    collection to a bounded candidate set.
//! 2. Semantic ranking: the candidates are ordered by nearest-neighbor
//!    relevance to the summary/keywords/sector query and cut to `maxdoc`.
//! 3. Chunk retrieval: nearest chunks to `query`, scoped to the ranked
//!    documents and cut to `maxchunks`.
//!
//! Upstream failures never surface as errors. Each phase degrades to a
//! simpler path and records a [`SearchNotice`] instead.

mod chunks;
mod filter;
mod ranking;

use crate::criteria::SearchCriteria;
use draftforge_common::config::RetrievalConfig;
use draftforge_common::embeddings::Embedder;
use draftforge_common::errors::{AppError, Result};
use draftforge_common::metrics;
use draftforge_common::models::{Chunk, Document};
use draftforge_common::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Degraded or notable paths taken during a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchNotice {
    /// No exact filter given; candidates are an unfiltered bounded fetch
    NoFilters,
    /// The filtered query failed; the predicate was applied in-process
    FilterFallback,
    /// Phase 1 produced no candidates
    NoDocumentsMatched,
    /// No summary/keywords/sector; candidates kept in arrival order
    NoSemanticCriteria,
    /// Document ranking failed; candidates kept in arrival order
    RankingFallback,
    /// Ranked documents were topped up from the candidate set
    Backfilled,
    /// Ranking left no document
    NoCandidates,
    /// No chunk belonged to the ranked documents; nearest chunks returned as-is
    UnscopedChunks,
    /// Chunk retrieval failed; no chunks returned
    ChunkQueryFailed,
}

impl SearchNotice {
    fn metric_kind(&self) -> &'static str {
        match self {
            SearchNotice::NoFilters => "no_filters",
            SearchNotice::FilterFallback => "filter_fallback",
            SearchNotice::NoDocumentsMatched => "no_documents_matched",
            SearchNotice::NoSemanticCriteria => "no_semantic_criteria",
            SearchNotice::RankingFallback => "ranking_fallback",
            SearchNotice::Backfilled => "backfilled",
            SearchNotice::NoCandidates => "no_candidates",
            SearchNotice::UnscopedChunks => "unscoped_chunks",
            SearchNotice::ChunkQueryFailed => "chunk_query_failed",
        }
    }
}

/// Result of a search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
    pub message: String,
    #[serde(default)]
    pub notices: Vec<SearchNotice>,
}

/// Retrieval engine over a document + chunk corpus
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Run all three phases.
    ///
    /// Only malformed criteria produce an error.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome> {
        criteria.check()?;

        let start = Instant::now();
        let mut notices = Vec::new();

        tracing::info!(
            maxdoc = criteria.maxdoc,
            maxchunks = criteria.maxchunks,
            "Starting three-phase search"
        );

        let candidates = self.exact_filter(criteria, &mut notices).await;
        if candidates.is_empty() {
            notices.push(SearchNotice::NoDocumentsMatched);
            return Ok(self.finish(
                start,
                Vec::new(),
                Vec::new(),
                "No document matched the exact filters".to_string(),
                notices,
            ));
        }

        let ranked = self.rank_documents(criteria, &candidates, &mut notices).await;
        if ranked.is_empty() {
            notices.push(SearchNotice::NoCandidates);
            return Ok(self.finish(
                start,
                Vec::new(),
                Vec::new(),
                "No candidate document found".to_string(),
                notices,
            ));
        }

        let document_ids: Vec<&str> = ranked.iter().map(|d| d.id.as_str()).collect();
        let chunks = self
            .retrieve_chunks(criteria, &document_ids, &mut notices)
            .await;

        let documents: Vec<Document> = ranked.iter().map(Document::from_object).collect();
        let message = format!(
            "Found {} document(s) and {} chunk(s)",
            documents.len(),
            chunks.len()
        );
        Ok(self.finish(start, documents, chunks, message, notices))
    }

    fn finish(
        &self,
        start: Instant,
        documents: Vec<Document>,
        chunks: Vec<Chunk>,
        message: String,
        notices: Vec<SearchNotice>,
    ) -> SearchOutcome {
        for notice in &notices {
            metrics::record_retrieval_fallback(notice.metric_kind());
        }
        metrics::record_search(start.elapsed().as_secs_f64(), documents.len(), chunks.len());

        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            notices = ?notices,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );

        SearchOutcome {
            documents,
            chunks,
            message,
            notices,
        }
    }

    /// Bound an upstream store call by the configured timeout
    async fn store_call<T, F>(&self, what: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.upstream_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StoreError {
                message: format!(
                    "{} timed out after {}ms",
                    what, self.config.upstream_timeout_ms
                ),
            }),
        }
    }

    /// Embed under the configured timeout
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(self.config.upstream_timeout(), self.embedder.embed(text)).await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::EmbeddingTimeout {
                timeout_ms: self.config.upstream_timeout_ms,
            }),
        }
    }
}
