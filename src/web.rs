use crate::{
    config::Config,
    metadata::{CompanyMetadata, MetaError, Pipeline},
};
use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::set_header::SetResponseHeaderLayer;

pub struct SharedState {
    pipeline: Pipeline,
    /// Parent of every request token; cancelled on shutdown
    shutdown: CancellationToken,
}

impl SharedState {
    pub fn new(pipeline: Pipeline, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self { pipeline, shutdown })
    }
}

#[derive(Debug)]
enum HttpError {
    MissingUrl,
    Meta(MetaError),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self {
            HttpError::MissingUrl => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Missing url"})),
            ),
            HttpError::Meta(err @ MetaError::InvalidInput(_)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": err.to_string()})),
            ),
            HttpError::Meta(err @ MetaError::Cancelled) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": err.to_string()})),
            ),
            HttpError::Meta(err) => {
                log::error!("{err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": err.to_string()})),
                )
            }
        }
        .into_response()
    }
}

impl From<MetaError> for HttpError {
    fn from(err: MetaError) -> Self {
        Self::Meta(err)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    pub url: Option<String>,
}

/// `favicon` is the key older clients read; `logo` carries the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub title: String,
    pub description: String,
    pub favicon: Option<String>,
    pub logo: Option<String>,
}

impl From<CompanyMetadata> for ScrapeResponse {
    fn from(m: CompanyMetadata) -> Self {
        Self {
            title: m.title,
            description: m.description,
            favicon: m.logo_url.clone(),
            logo: m.logo_url,
        }
    }
}

async fn scrape(state: &SharedState, url: Option<String>) -> Result<Json<ScrapeResponse>, HttpError> {
    let url = url
        .filter(|u| !u.trim().is_empty())
        .ok_or(HttpError::MissingUrl)?;

    log::debug!("scrape request: {url}");

    // cancelled together with the daemon
    let cancel = state.shutdown.child_token();
    let metadata = state.pipeline.fetch_company_metadata(&url, &cancel).await?;

    Ok(Json(metadata.into()))
}

async fn scrape_post(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, HttpError> {
    scrape(&state, payload.url).await
}

async fn scrape_get(
    State(state): State<Arc<SharedState>>,
    Query(query): Query<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, HttpError> {
    scrape(&state, query.url).await
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route(
            "/api/scrape-company-info",
            get(scrape_get).post(scrape_post),
        )
        .route("/api/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn shutdown_signal(shutdown: CancellationToken) {
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

    log::warn!("shutting down, cancelling in-flight requests");
    shutdown.cancel();
}

async fn start_app(config: Config, listen: String) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(&config).context("failed to build http client")?;
    let shutdown = CancellationToken::new();
    let state = SharedState::new(pipeline, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    log::info!("listening on {listen}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config, listen: Option<String>) -> anyhow::Result<()> {
    let listen = listen.unwrap_or_else(|| config.listen.clone());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(config, listen).await })
}
