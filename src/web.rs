use crate::{
    config::{Config, StoreBackend},
    documents::{Document, ValidationError},
    errors::AppError,
    semantic::{
        BatchIndexResponse, DeleteResponse, EmbeddingProvider, ExaSearch, GraphQuery,
        GraphResponse, HealthReport, IndexResponse, MemoryStore, QdrantStore, RemoteEmbedder,
        SearchQuery, SearchResult, SemanticService, Stats, VectorStore,
    },
};
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    service: Arc<SemanticService>,
}

pub fn router(service: Arc<SemanticService>) -> Router {
    let shared_state = Arc::new(SharedState { service });

    Router::new()
        .route("/index", post(index))
        .route("/index/batch", post(index_batch))
        .route("/search", post(search))
        .route("/graph", post(graph))
        .route("/stats", get(stats))
        .route("/documents/:id", delete(delete_document))
        .route("/health", get(health))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

/// Wire up the collaborators named in the config.
pub fn build_service(config: &Config) -> anyhow::Result<SemanticService> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        RemoteEmbedder::new(
            &config.embedding.url,
            config.embedding.dimension,
            config.embedding_timeout(),
        )
        .context("failed to build embedding client")?,
    );

    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Qdrant => Arc::new(
            QdrantStore::new(&config.store.host, config.store.port, config.store_timeout())
                .context("failed to build vector store client")?,
        ),
        StoreBackend::Memory => {
            log::warn!("using the in-memory store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let mut service = SemanticService::new(
        embedder,
        store,
        &config.store.collection,
        config.embedding.dimension,
    );

    match &config.augment.api_key {
        Some(api_key) => {
            let exa = ExaSearch::new(&config.augment.base_url, api_key, config.augment_timeout())
                .context("failed to build web search client")?;
            service = service.with_web_search(Arc::new(exa));
            log::info!("web search augmentation enabled");
        }
        None => log::info!("web search augmentation disabled"),
    }

    Ok(service)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let service = build_service(&config)?;
    service
        .init()
        .await
        .context("failed to initialize the collection")?;

    let collection = service.collection().to_string();
    let app = router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    log::info!("serving {collection:?} on {}", config.server.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(config))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = if self.0.is_validation() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            log::error!("{}", self.0);
            StatusCode::SERVICE_UNAVAILABLE
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Malformed request bodies are validation errors like any other.
fn body_rejection(rejection: JsonRejection) -> ValidationError {
    ValidationError::field("body", rejection.body_text())
}

async fn index(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<Json<IndexResponse>, HttpError> {
    let Json(document) = payload.map_err(body_rejection)?;
    Ok(Json(state.service.index_one(document).await?))
}

async fn index_batch(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<Vec<Document>>, JsonRejection>,
) -> Result<Json<BatchIndexResponse>, HttpError> {
    let Json(documents) = payload.map_err(body_rejection)?;
    Ok(Json(state.service.index_batch(documents).await?))
}

async fn search(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<SearchQuery>, JsonRejection>,
) -> Result<Json<Vec<SearchResult>>, HttpError> {
    let Json(query) = payload.map_err(body_rejection)?;
    Ok(Json(state.service.search(query).await?))
}

async fn graph(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<GraphQuery>, JsonRejection>,
) -> Result<Json<GraphResponse>, HttpError> {
    let Json(query) = payload.map_err(body_rejection)?;
    Ok(Json(state.service.graph(query).await?))
}

async fn stats(State(state): State<Arc<SharedState>>) -> Result<Json<Stats>, HttpError> {
    Ok(Json(state.service.stats().await?))
}

async fn delete_document(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, HttpError> {
    Ok(Json(state.service.delete(&id).await?))
}

async fn health(State(state): State<Arc<SharedState>>) -> Json<HealthReport> {
    Json(state.service.health().await)
}
