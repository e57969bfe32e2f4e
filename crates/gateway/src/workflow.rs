//! Section generation workflow
//!
//! retrieve context -> generate -> inject into the template -> publish.
//! Runs detached from the request that started it; failures end the job
//! without touching the template or the stream.

use draftforge_common::{errors::Result, llm::GenerationPrompt, metrics, Notifier};
use draftforge_search::SearchCriteria;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub template_id: String,
    pub section: String,
    pub instruction: String,
    pub question: String,
    pub criteria: Option<SearchCriteria>,
}

pub fn spawn(state: AppState, job: GenerationJob) -> JoinHandle<()> {
    tokio::spawn(async move {
        let job_id = job.id;
        let section = job.section.clone();
        if let Err(e) = run(&state, job).await {
            warn!(job_id = %job_id, section = %section, error = %e, "Generation job failed");
        }
    })
}

/// Returns how many listeners received the section
pub async fn run(state: &AppState, job: GenerationJob) -> Result<usize> {
    let context = gather_context(state, &job).await?;
    info!(
        job_id = %job.id,
        section = %job.section,
        passages = context.len(),
        "Context gathered"
    );

    let prompt = GenerationPrompt {
        instruction: job.instruction,
        question: job.question,
        context,
    };

    let start = Instant::now();
    let generated = state.generator.generate(&prompt).await;
    metrics::record_generation(start.elapsed().as_secs_f64(), generated.is_ok());
    let content = generated?;

    let manager = state.templates.get(&job.template_id).await?;
    manager.lock().await.inject(&job.section, &content).await?;

    let delivered = state
        .notifier
        .publish(Notifier::section_message(&job.section, &content));
    info!(
        job_id = %job.id,
        template_id = %job.template_id,
        section = %job.section,
        model = state.generator.model_name(),
        delivered,
        "Section generated"
    );
    Ok(delivered)
}

async fn gather_context(state: &AppState, job: &GenerationJob) -> Result<Vec<String>> {
    let chunks = match &job.criteria {
        Some(criteria) => state.engine.search(criteria).await?.chunks,
        None => {
            state
                .engine
                .context_passages(&job.question, state.config.retrieval.context_limit)
                .await
        }
    };
    Ok(chunks.into_iter().map(|chunk| chunk.content).collect())
}
