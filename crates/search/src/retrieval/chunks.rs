//! Phase 3: chunk retrieval, plus the single-shot hybrid context lookup

use super::{RetrievalEngine, SearchNotice};
use crate::criteria::SearchCriteria;
use draftforge_common::models::Chunk;
use draftforge_common::store::Collection;

impl RetrievalEngine {
    /// Nearest chunks to `criteria.query` owned by `document_ids`
    pub(super) async fn retrieve_chunks(
        &self,
        criteria: &SearchCriteria,
        document_ids: &[&str],
        notices: &mut Vec<SearchNotice>,
    ) -> Vec<Chunk> {
        let maxchunks = criteria.maxchunks;

        let vector = match self.embed(&criteria.query).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Phase 3: query embedding failed");
                notices.push(SearchNotice::ChunkQueryFailed);
                return Vec::new();
            }
        };

        let limit = maxchunks.saturating_mul(self.config.chunk_overfetch.max(1));
        let rows = match self
            .store_call(
                "chunk vector query",
                self.store.vector_query(Collection::Chunk, &vector, limit),
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Phase 3: chunk vector query failed");
                notices.push(SearchNotice::ChunkQueryFailed);
                return Vec::new();
            }
        };

        let scoped: Vec<Chunk> = rows
            .iter()
            .filter(|row| {
                row.document_ref
                    .as_deref()
                    .is_some_and(|owner| document_ids.contains(&owner))
            })
            .take(maxchunks)
            .map(Chunk::from_object)
            .collect();

        if scoped.is_empty() && !rows.is_empty() && self.config.unscoped_chunk_fallback {
            tracing::info!(
                returned = rows.len(),
                "Phase 3: no chunk belongs to the ranked documents, returning nearest chunks"
            );
            notices.push(SearchNotice::UnscopedChunks);
            return rows.iter().take(maxchunks).map(Chunk::from_object).collect();
        }

        tracing::debug!(count = scoped.len(), "Phase 3: chunks retrieved");
        scoped
    }

    /// Hybrid keyword + vector lookup over all chunks.
    ///
    /// Used when no structured criteria are available. Failures yield an
    /// empty list.
    pub async fn context_passages(&self, query: &str, limit: usize) -> Vec<Chunk> {
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }

        let vector = match self.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Context lookup: query embedding failed");
                return Vec::new();
            }
        };

        match self
            .store_call(
                "chunk hybrid query",
                self.store.hybrid_query(
                    Collection::Chunk,
                    query,
                    &vector,
                    limit,
                    self.config.hybrid_alpha,
                ),
            )
            .await
        {
            Ok(rows) => rows.iter().take(limit).map(Chunk::from_object).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Context lookup: hybrid query failed");
                Vec::new()
            }
        }
    }
}
