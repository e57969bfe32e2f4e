//! Configuration management for DraftForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Every section has defaults, so an empty environment yields a runnable
//! development setup (in-memory store, hashing embedder, echo generator).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Retrieval engine tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Corpus ingestion
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Template directories
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Text generation (LLM) configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Notification fan-out
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// SSE keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub sse_keep_alive_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store provider: memory, weaviate
    #[serde(default = "default_store_provider")]
    pub provider: String,

    /// Base URL of the Weaviate instance
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Optional API key sent as a bearer token
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Maximum elapsed time for retrying transient failures, in milliseconds
    #[serde(default = "default_store_retry_ms")]
    pub max_retry_elapsed_ms: u64,

    /// JSON corpus ingested at startup (memory store only)
    pub seed_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Phase 1 candidate cap
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Phase 2 nearest-neighbor over-fetch factor (x maxdoc)
    #[serde(default = "default_document_overfetch")]
    pub document_overfetch: usize,

    /// Phase 3 nearest-neighbor over-fetch factor (x maxchunks)
    #[serde(default = "default_chunk_overfetch")]
    pub chunk_overfetch: usize,

    /// Return unscoped chunks when none belong to the selected documents
    #[serde(default = "default_enabled")]
    pub unscoped_chunk_fallback: bool,

    /// Vector weight for hybrid context queries
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,

    /// Chunks gathered by the quick hybrid context lookup
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// Timeout applied to each embedding or store call, in milliseconds
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplatesConfig {
    /// Directory holding `{id}.html` and `{id}.json`
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,

    /// Directory for generated HTML, state files and exports
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Template used when a request names none
    pub default_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generator provider: openai, echo
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// Chat completions endpoint
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    /// API key
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Per-subscriber mailbox capacity
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or an EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Generation requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_request_timeout() -> u64 { 30 }
fn default_keep_alive() -> u64 { 15 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_store_provider() -> String { "memory".to_string() }
fn default_store_url() -> String { "http://localhost:8080".to_string() }
fn default_store_timeout() -> u64 { 10 }
fn default_store_retry_ms() -> u64 { 2_000 }
fn default_candidate_limit() -> usize { 50 }
fn default_document_overfetch() -> usize { 3 }
fn default_chunk_overfetch() -> usize { 5 }
fn default_hybrid_alpha() -> f32 { 0.5 }
fn default_context_limit() -> usize { 2 }
fn default_upstream_timeout() -> u64 { 10_000 }
fn default_chunk_size() -> usize { 500 }
fn default_templates_dir() -> String { "templates".to_string() }
fn default_output_dir() -> String { "outputs".to_string() }
fn default_generation_provider() -> String { "echo".to_string() }
fn default_generation_endpoint() -> String { "https://openrouter.ai/api/v1/chat/completions".to_string() }
fn default_generation_model() -> String { "openai/gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> usize { 800 }
fn default_generation_timeout() -> u64 { 120 }
fn default_mailbox_capacity() -> usize { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "draftforge".to_string() }
fn default_rate_limit() -> u32 { 5 }
fn default_burst() -> u32 { 10 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            sse_keep_alive_secs: default_keep_alive(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            url: default_store_url(),
            api_key: None,
            timeout_secs: default_store_timeout(),
            max_retry_elapsed_ms: default_store_retry_ms(),
            seed_path: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            document_overfetch: default_document_overfetch(),
            chunk_overfetch: default_chunk_overfetch(),
            unscoped_chunk_fallback: default_enabled(),
            hybrid_alpha: default_hybrid_alpha(),
            context_limit: default_context_limit(),
            upstream_timeout_ms: default_upstream_timeout(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            output_dir: default_output_dir(),
            default_template: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            endpoint: default_generation_endpoint(),
            api_key: None,
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl RetrievalConfig {
    /// Per-call upstream timeout as Duration
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.store.provider, "memory");
        assert_eq!(config.retrieval.candidate_limit, 50);
        assert_eq!(config.retrieval.document_overfetch, 3);
        assert_eq!(config.retrieval.chunk_overfetch, 5);
        assert!(config.retrieval.unscoped_chunk_fallback);
        assert_eq!(config.notifications.mailbox_capacity, 5);
    }

    #[test]
    fn test_empty_source_deserializes_to_defaults() {
        let config: AppConfig = Config::builder()
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();
        assert_eq!(config.templates.templates_dir, "templates");
        assert_eq!(config.templates.output_dir, "outputs");
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.generation.provider, "echo");
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("retrieval.candidate_limit", 10)
            .unwrap()
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();
        assert_eq!(config.retrieval.candidate_limit, 10);
        assert_eq!(config.retrieval.chunk_overfetch, 5);
        assert_eq!(config.retrieval.upstream_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
