//! Corpus ingestion
//!
//! A document is stored once with a vector computed from its metadata;
//! its page texts are split into chunks, each embedded from its content
//! alone and stored with a reference back to the document.

use draftforge_common::config::IngestConfig;
use draftforge_common::embeddings::Embedder;
use draftforge_common::errors::{AppError, Result};
use draftforge_common::metrics;
use draftforge_common::models::{Chunk, Document};
use draftforge_common::store::{Collection, StoredObject, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use text_splitter::{ChunkConfig, TextSplitter};
use validator::Validate;

/// Text of one page of a source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// A document to ingest
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DocumentUpload {
    #[serde(flatten)]
    pub document: Document,

    #[validate(length(max = 2000))]
    #[serde(default)]
    pub pages: Vec<PageText>,
}

/// Outcome of one ingestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub document_id: String,
    pub chunk_count: usize,
}

/// Split page text into chunks of at most `chunk_size` characters
pub fn split_pages(pages: &[PageText], chunk_size: usize) -> Vec<Chunk> {
    let splitter = TextSplitter::new(ChunkConfig::new(chunk_size.max(1)));

    let mut chunks = Vec::new();
    for page in pages {
        for piece in splitter.chunks(&page.text) {
            let content = piece.trim();
            if content.is_empty() {
                continue;
            }
            chunks.push(Chunk {
                id: String::new(),
                index: chunks.len() as u32,
                content: content.to_string(),
                page: page.page,
                document_id: None,
            });
        }
    }

    tracing::debug!(pages = pages.len(), chunks = chunks.len(), chunk_size, "Pages chunked");
    chunks
}

pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: IngestConfig,
}

impl Indexer {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, config: IngestConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Store the document, then its chunks. Upstream failures propagate.
    pub async fn ingest(&self, upload: DocumentUpload) -> Result<IngestReport> {
        upload.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: None,
        })?;
        if upload.document.title.trim().is_empty() {
            return Err(AppError::validation("title", "title must not be blank"));
        }

        let DocumentUpload { document, pages } = upload;

        let vector = self.embedder.embed(&document.embedding_text()).await?;
        let document_id = self
            .store
            .insert(
                Collection::Document,
                StoredObject::new(document.id.clone(), document.to_properties()),
                vector,
            )
            .await?;

        let chunks = split_pages(&pages, self.config.chunk_size);
        if !chunks.is_empty() {
            let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&contents).await?;
            if vectors.len() != chunks.len() {
                return Err(AppError::EmbeddingError {
                    message: format!(
                        "expected {} chunk embeddings, got {}",
                        chunks.len(),
                        vectors.len()
                    ),
                });
            }

            for (chunk, vector) in chunks.iter().zip(vectors) {
                let object = StoredObject::new(String::new(), chunk.to_properties())
                    .with_document_ref(document_id.clone());
                self.store.insert(Collection::Chunk, object, vector).await?;
            }
        }

        metrics::record_ingestion(chunks.len());
        tracing::info!(
            document_id = %document_id,
            title = %document.title,
            chunks = chunks.len(),
            "Document ingested"
        );

        Ok(IngestReport {
            document_id,
            chunk_count: chunks.len(),
        })
    }

    /// Ingest every document of a JSON array file
    pub async fn seed_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let uploads: Vec<DocumentUpload> = serde_json::from_str(&raw)?;

        let mut ingested = 0;
        for upload in uploads {
            self.ingest(upload).await?;
            ingested += 1;
        }

        tracing::info!(path = %path.display(), documents = ingested, "Seed corpus loaded");
        Ok(ingested)
    }
}
