//! Corpus ingestion handlers

use axum::{extract::State, http::StatusCode, Json};
use draftforge_common::errors::Result;
use draftforge_search::{DocumentUpload, IngestReport};

use crate::AppState;

/// Embed and store a document with its pages
pub async fn ingest(
    State(state): State<AppState>,
    Json(upload): Json<DocumentUpload>,
) -> Result<(StatusCode, Json<IngestReport>)> {
    let report = state.indexer.ingest(upload).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[cfg(test)]
mod tests {
    use crate::testing::{send, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_ingest_reports_chunks() {
        let (_root, state) = state();
        let (status, body) = send(
            &state,
            "POST",
            "/api/corpus/documents",
            Some(json!({
                "title": "Audit",
                "pages": [
                    {"page": 1, "text": "First page."},
                    {"page": 2, "text": "   "},
                    {"page": 3, "text": "Third page."}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["chunk_count"], 2);
        assert!(!json["document_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_requires_title() {
        let (_root, state) = state();
        let (status, _) = send(
            &state,
            "POST",
            "/api/corpus/documents",
            Some(json!({"title": " ", "pages": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
