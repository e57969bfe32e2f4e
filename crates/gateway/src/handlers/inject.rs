//! Direct injection: write sections as given and broadcast them

use axum::{extract::State, Json};
use draftforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::templates::SectionContent;
use crate::AppState;

/// `{"template_id": "brief", "sections": {"client": {"contenu": "ACME"}}}`
#[derive(Debug, Deserialize)]
pub struct InjectRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    pub sections: BTreeMap<String, SectionContent>,
}

#[derive(Serialize)]
pub struct InjectResponse {
    pub template_id: Option<String>,
    pub injected: Vec<String>,
    pub delivered: usize,
}

pub async fn inject(
    State(state): State<AppState>,
    Json(request): Json<InjectRequest>,
) -> Result<Json<InjectResponse>> {
    if request.sections.is_empty() {
        return Err(AppError::validation("sections", "at least one section is required"));
    }

    let template_id = request
        .template_id
        .or_else(|| state.config.templates.default_template.clone());

    if let Some(id) = template_id.as_deref() {
        let manager = state.templates.get(id).await?;
        let mut manager = manager.lock().await;

        // One commit: an unknown key leaves the template untouched
        manager
            .inject_all(
                request
                    .sections
                    .iter()
                    .map(|(section, content)| (section.as_str(), content.contenu.as_str())),
            )
            .await?;
    }

    let message = serde_json::to_string(&request.sections)?;
    let delivered = state.notifier.publish(message);
    tracing::info!(
        template_id = ?template_id,
        sections = request.sections.len(),
        delivered,
        "Sections injected"
    );

    Ok(Json(InjectResponse {
        template_id,
        injected: request.sections.into_keys().collect(),
        delivered,
    }))
}
