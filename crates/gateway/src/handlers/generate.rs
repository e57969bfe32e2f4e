//! Background section generation

use axum::{extract::State, http::StatusCode, Json};
use draftforge_common::errors::{AppError, Result};
use draftforge_search::SearchCriteria;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::workflow::{self, GenerationJob};
use crate::AppState;

/// Generation request
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[serde(default)]
    pub template_id: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub section: String,

    /// Free-text request; defaults to the section's instruction
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub question: Option<String>,

    /// Full three-phase search instead of a quick passage lookup
    #[serde(default)]
    pub criteria: Option<SearchCriteria>,
}

#[derive(Serialize)]
pub struct GenerateAccepted {
    pub job_id: Uuid,
    pub template_id: String,
    pub section: String,
}

/// Validate, resolve the section instruction, then hand off to a task.
/// The generated content arrives over `/stream`.
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateAccepted>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let template_id = request
        .template_id
        .or_else(|| state.config.templates.default_template.clone())
        .ok_or_else(|| AppError::validation("template_id", "no template given and no default configured"))?;

    let instruction = {
        let manager = state.templates.get(&template_id).await?;
        let manager = manager.lock().await;
        manager.ia_prompt(&request.section)?
    };

    let question = request
        .question
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| instruction.clone());

    let criteria = match request.criteria {
        Some(mut criteria) => {
            if criteria.query.trim().is_empty() {
                criteria.query = question.clone();
            }
            criteria.check()?;
            Some(criteria)
        }
        None => None,
    };

    let job = GenerationJob {
        id: Uuid::new_v4(),
        template_id: template_id.clone(),
        section: request.section.clone(),
        instruction,
        question,
        criteria,
    };
    let job_id = job.id;
    workflow::spawn(state, job);

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateAccepted {
            job_id,
            template_id,
            section: request.section,
        }),
    ))
}
