//! DraftForge API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Template editing and export
//! - Corpus search and ingestion
//! - Background section generation
//! - Live section stream (SSE)
//! - Rate limiting and observability

mod handlers;
mod middleware;
mod workflow;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use draftforge_common::{
    config::AppConfig,
    embeddings::create_embedder,
    llm::create_generator,
    metrics,
    store::create_store,
    Generator, Notifier, VectorStore,
};
use draftforge_search::{Indexer, RetrievalEngine};
use draftforge_template::TemplateStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn VectorStore>,
    pub engine: Arc<RetrievalEngine>,
    pub indexer: Arc<Indexer>,
    pub templates: Arc<TemplateStore>,
    pub notifier: Arc<Notifier>,
    pub generator: Arc<dyn Generator>,
}

impl AppState {
    /// Wire every collaborator from configuration
    pub fn from_config(config: AppConfig) -> draftforge_common::Result<Self> {
        let store = create_store(&config.store)?;
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;

        let engine = RetrievalEngine::new(store.clone(), embedder.clone(), config.retrieval.clone());
        let indexer = Indexer::new(store.clone(), embedder, config.ingest.clone());
        let templates = TemplateStore::new(
            &config.templates.templates_dir,
            &config.templates.output_dir,
        );
        let notifier = Notifier::new(config.notifications.mailbox_capacity);

        Ok(Self {
            config: Arc::new(config),
            store,
            engine: Arc::new(engine),
            indexer: Arc::new(indexer),
            templates: Arc::new(templates),
            notifier: Arc::new(notifier),
            generator,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config);
    info!("Starting DraftForge API Gateway v{}", draftforge_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!(%metrics_addr, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    let state = AppState::from_config(config)?;

    if let Some(seed) = state.config.store.seed_path.as_deref() {
        let count = state.indexer.seed_from_file(seed).await?;
        info!(path = seed, documents = count, "Seed corpus loaded");
    }

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;
    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Generation and direct injection are throttled
    let mut throttled = Router::new()
        .route("/generate", post(handlers::generate::generate))
        .route("/inject", post(handlers::inject::inject));
    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        throttled = throttled.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit,
        ));
    }

    let api_routes = Router::new()
        // Template files
        .route("/templates-files", get(handlers::templates::list_templates))
        .route("/documents/{filename}", get(handlers::templates::document_source))

        // Working templates
        .route("/templates/{id}", get(handlers::templates::get_template))
        .route("/templates/{id}/sections", post(handlers::templates::add_section))
        .route(
            "/templates/{id}/sections/{section}",
            put(handlers::templates::inject_section).delete(handlers::templates::remove_section),
        )
        .route("/templates/{id}/export", post(handlers::templates::export))

        // Corpus
        .route("/search", post(handlers::search::search))
        .route("/corpus/documents", post(handlers::corpus::ingest))
        .merge(throttled);

    // Bounds time to response headers; streamed bodies are not cut off
    let timeout = TimeoutLayer::new(state.config.request_timeout());

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/stream", get(handlers::stream::stream))
        .nest("/api", api_routes)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const HTML: &str = "<html><body><main>\n<p>{{budget}}</p>\n<p>{{client}}</p>\n</main></body></html>";
    const SCHEMA: &str = r#"{
        "budget": {"contenu_initiale": "TBD", "contenu": "{{budget}}", "ia_prompt": "Summarize the budget."},
        "client": {"contenu_initiale": "", "contenu": "{{client}}", "ia_prompt": "Name the client."}
    }"#;

    /// Offline state rooted in a temp directory with one template, `brief`
    pub fn state() -> (TempDir, AppState) {
        let root = tempfile::tempdir().unwrap();
        let templates = root.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("brief.html"), HTML).unwrap();
        std::fs::write(templates.join("brief.json"), SCHEMA).unwrap();

        let mut config = AppConfig::default();
        config.templates.templates_dir = templates.display().to_string();
        config.templates.output_dir = root.path().join("outputs").display().to_string();
        config.rate_limit.enabled = false;

        (root, AppState::from_config(config).unwrap())
    }

    pub async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, String) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = create_router(state.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let (_root, state) = state();
        let (status, body) = send(&state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healthy"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (_root, state) = state();
        let (status, _) = send(&state, "GET", "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let (_root, state) = state();
        let response = super::create_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_direct_injection_is_rate_limited() {
        let (_root, mut state) = state();
        let mut config = (*state.config).clone();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        state.config = Arc::new(config);

        let body = serde_json::json!({"template_id": "brief", "sections": {"client": {"contenu": "ACME"}}});
        let make = || {
            Request::builder()
                .method("POST")
                .uri("/api/inject")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let router = super::create_router(state);
        let first = router.clone().oneshot(make()).await.unwrap();
        let second = router.oneshot(make()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
