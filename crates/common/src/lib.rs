//! DraftForge Common Library
//!
//! Shared code for the DraftForge crates including:
//! - Error types and handling
//! - Configuration management
//! - Embedding client abstraction
//! - Vector store contract and adapters
//! - Corpus models (documents and chunks)
//! - Text generation contract
//! - Section notification fan-out
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::Generator;
pub use models::{Chunk, Document};
pub use notify::Notifier;
pub use store::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension for the offline hashing embedder
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
