//! Phase 1: exact property filters

use super::{RetrievalEngine, SearchNotice};
use crate::criteria::SearchCriteria;
use draftforge_common::store::{Collection, Filter, StoredObject};

/// OR within a field, AND across fields
pub(crate) fn build_filter(criteria: &SearchCriteria) -> Option<Filter> {
    let groups: Vec<Filter> = criteria
        .exact_groups()
        .into_iter()
        .map(|(property, values)| {
            Filter::Any(
                values
                    .into_iter()
                    .map(|value| Filter::equal(property, value))
                    .collect(),
            )
        })
        .collect();

    if groups.is_empty() {
        None
    } else {
        Some(Filter::All(groups))
    }
}

impl RetrievalEngine {
    /// Candidate documents, in store order, at most `candidate_limit`
    pub(super) async fn exact_filter(
        &self,
        criteria: &SearchCriteria,
        notices: &mut Vec<SearchNotice>,
    ) -> Vec<StoredObject> {
        let limit = self.config.candidate_limit;

        let Some(filter) = build_filter(criteria) else {
            notices.push(SearchNotice::NoFilters);
            return match self
                .store_call(
                    "unfiltered document fetch",
                    self.store.filter_query(Collection::Document, None, limit),
                )
                .await
            {
                Ok(documents) => {
                    tracing::debug!(count = documents.len(), "Phase 1: no filters, unfiltered fetch");
                    documents
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Phase 1: unfiltered fetch failed");
                    Vec::new()
                }
            };
        };

        match self
            .store_call(
                "filtered document fetch",
                self.store
                    .filter_query(Collection::Document, Some(&filter), limit),
            )
            .await
        {
            Ok(documents) => {
                tracing::debug!(count = documents.len(), "Phase 1: exact filter applied");
                documents
            }
            Err(e) => {
                tracing::warn!(error = %e, "Phase 1: filtered query failed, filtering in-process");
                notices.push(SearchNotice::FilterFallback);
                self.filter_in_process(&filter, limit).await
            }
        }
    }

    async fn filter_in_process(&self, filter: &Filter, limit: usize) -> Vec<StoredObject> {
        match self
            .store_call(
                "unfiltered document fetch",
                self.store.filter_query(Collection::Document, None, limit),
            )
            .await
        {
            Ok(documents) => {
                let kept: Vec<StoredObject> = documents
                    .into_iter()
                    .filter(|d| filter.matches(&d.properties))
                    .collect();
                tracing::debug!(count = kept.len(), "Phase 1: in-process filter applied");
                kept
            }
            Err(e) => {
                tracing::warn!(error = %e, "Phase 1: fallback fetch failed, no candidates");
                Vec::new()
            }
        }
    }
}
