//! Template handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use draftforge_common::errors::Result;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Serialize)]
pub struct TemplateList {
    pub templates: Vec<String>,
}

/// Raw template files, as the editor preview expects them
#[derive(Serialize)]
pub struct DocumentSource {
    pub html: String,
    #[serde(rename = "jsonData")]
    pub json_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionContent {
    pub contenu: String,
}

#[derive(Debug, Deserialize)]
pub struct NewSection {
    pub titre: String,
    #[serde(default)]
    pub contenu: String,
}

#[derive(Serialize)]
pub struct SectionResponse {
    pub template_id: String,
    pub section: String,
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub template_id: String,
    pub path: String,
}

/// List template files (`{id}.html`)
pub async fn list_templates(State(state): State<AppState>) -> Result<Json<TemplateList>> {
    let templates = state
        .templates
        .list()
        .await?
        .into_iter()
        .map(|id| format!("{}.html", id))
        .collect();
    Ok(Json(TemplateList { templates }))
}

/// Unrendered HTML plus schema. Accepts `brief`, `brief.html` or `brief.json`.
pub async fn document_source(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<DocumentSource>> {
    let id = filename
        .strip_suffix(".html")
        .or_else(|| filename.strip_suffix(".json"))
        .unwrap_or(&filename);
    let source = state.templates.source(id).await?;
    Ok(Json(DocumentSource {
        html: source.html,
        json_data: source.schema,
    }))
}

/// Current merged HTML
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>> {
    let manager = state.templates.get(&id).await?;
    let html = manager.lock().await.render().to_string();
    Ok(Html(html))
}

pub async fn inject_section(
    State(state): State<AppState>,
    Path((id, section)): Path<(String, String)>,
    Json(body): Json<SectionContent>,
) -> Result<Json<SectionResponse>> {
    let manager = state.templates.get(&id).await?;
    manager.lock().await.inject(&section, &body.contenu).await?;
    Ok(Json(SectionResponse {
        template_id: id,
        section,
    }))
}

pub async fn add_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NewSection>,
) -> Result<(StatusCode, Json<SectionResponse>)> {
    let manager = state.templates.get(&id).await?;
    let key = manager
        .lock()
        .await
        .add_section(&body.titre, &body.contenu)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SectionResponse {
            template_id: id,
            section: key,
        }),
    ))
}

pub async fn remove_section(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
) -> Result<StatusCode> {
    let manager = state.templates.get(&id).await?;
    manager.lock().await.remove_section(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Write `{output_dir}/exports/{id}.pdf`
pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExportResponse>> {
    let path = state.templates.export(&id).await?;
    Ok(Json(ExportResponse {
        template_id: id,
        path: path.display().to_string(),
    }))
}
