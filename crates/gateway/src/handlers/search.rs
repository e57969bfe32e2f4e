//! Search handlers

use axum::{extract::State, Json};
use draftforge_common::{errors::Result, metrics::RequestMetrics};
use draftforge_search::{SearchCriteria, SearchOutcome};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

/// Search response
#[derive(Serialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub outcome: SearchOutcome,
    pub processing_time_ms: u64,
}

/// Run the three-phase retrieval
pub async fn search(
    State(state): State<AppState>,
    Json(criteria): Json<SearchCriteria>,
) -> Result<Json<SearchResponse>> {
    let request_metrics = RequestMetrics::start("POST", "/api/search");
    let start = Instant::now();

    let outcome = match state.engine.search(&criteria).await {
        Ok(outcome) => outcome,
        Err(e) => {
            request_metrics.finish(e.status_code().as_u16());
            return Err(e);
        }
    };
    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        query = %criteria.query,
        documents = outcome.documents.len(),
        chunks = outcome.chunks.len(),
        notices = outcome.notices.len(),
        latency_ms = processing_time_ms,
        "Search completed"
    );
    request_metrics.finish(200);

    Ok(Json(SearchResponse {
        outcome,
        processing_time_ms,
    }))
}

#[cfg(test)]
mod tests {
    use crate::testing::{send, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_empty_corpus() {
        let (_root, state) = state();
        let (status, body) = send(
            &state,
            "POST",
            "/api/search",
            Some(json!({"query": "fiber rollout", "client": ["ACME"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["documents"].as_array().unwrap().len(), 0);
        assert_eq!(json["chunks"].as_array().unwrap().len(), 0);
        assert!(json["processing_time_ms"].is_u64());
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let (_root, state) = state();
        let (status, body) =
            send(&state, "POST", "/api/search", Some(json!({"query": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("query"));
    }

    #[tokio::test]
    async fn test_search_after_ingest() {
        let (_root, state) = state();
        let (status, _) = send(
            &state,
            "POST",
            "/api/corpus/documents",
            Some(json!({
                "title": "Fiber rollout",
                "client": "ACME",
                "document_type": "proposal",
                "summary": "Metropolitan fiber network deployment",
                "pages": [{"page": 1, "text": "Trenching plan for the fiber backbone."}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &state,
            "POST",
            "/api/search",
            Some(json!({"query": "fiber backbone trenching", "client": ["ACME"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["documents"][0]["title"], "Fiber rollout");
        assert_eq!(json["chunks"].as_array().unwrap().len(), 1);
    }
}
