//! Phase 2: semantic ranking of the candidate documents

use super::{RetrievalEngine, SearchNotice};
use crate::criteria::SearchCriteria;
use draftforge_common::store::{Collection, StoredObject};
use std::collections::HashSet;

/// Keep nearest-neighbor hits that are candidates, cut to `maxdoc`, then
/// top up from the candidates in their original order.
fn merge_ranked(
    nearest: Vec<StoredObject>,
    candidates: &[StoredObject],
    maxdoc: usize,
) -> (Vec<StoredObject>, bool) {
    let candidate_ids: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();

    let mut selected: Vec<StoredObject> = Vec::with_capacity(maxdoc);
    let mut seen: HashSet<String> = HashSet::new();
    for hit in nearest {
        if selected.len() >= maxdoc {
            break;
        }
        if candidate_ids.contains(hit.id.as_str()) && seen.insert(hit.id.clone()) {
            selected.push(hit);
        }
    }

    let mut backfilled = false;
    for candidate in candidates {
        if selected.len() >= maxdoc {
            break;
        }
        if seen.insert(candidate.id.clone()) {
            selected.push(candidate.clone());
            backfilled = true;
        }
    }

    (selected, backfilled)
}

impl RetrievalEngine {
    /// At most `maxdoc` documents drawn from `candidates`
    pub(super) async fn rank_documents(
        &self,
        criteria: &SearchCriteria,
        candidates: &[StoredObject],
        notices: &mut Vec<SearchNotice>,
    ) -> Vec<StoredObject> {
        let maxdoc = criteria.maxdoc;
        let arrival_order = || candidates.iter().take(maxdoc).cloned().collect::<Vec<_>>();

        let Some(query) = criteria.semantic_query() else {
            tracing::debug!(maxdoc, "Phase 2: no semantic criteria, keeping arrival order");
            notices.push(SearchNotice::NoSemanticCriteria);
            return arrival_order();
        };

        let vector = match self.embed(&query).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Phase 2: query embedding failed");
                notices.push(SearchNotice::RankingFallback);
                return arrival_order();
            }
        };

        let limit = maxdoc.saturating_mul(self.config.document_overfetch.max(1));
        let nearest = match self
            .store_call(
                "document vector query",
                self.store.vector_query(Collection::Document, &vector, limit),
            )
            .await
        {
            Ok(nearest) => nearest,
            Err(e) => {
                tracing::warn!(error = %e, "Phase 2: document vector query failed");
                notices.push(SearchNotice::RankingFallback);
                return arrival_order();
            }
        };

        let (selected, backfilled) = merge_ranked(nearest, candidates, maxdoc);
        if backfilled {
            notices.push(SearchNotice::Backfilled);
        }
        tracing::debug!(count = selected.len(), backfilled, "Phase 2: documents ranked");
        selected
    }
}
