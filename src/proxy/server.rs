//! HTTP server setup and routing

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::handler::ChatHandler;
use super::health::{health_handler, provider_health_handler};
use crate::api::{ChatRequest, ErrorBody};
use crate::config::AppConfig;
use crate::generator::{GeminiGenerator, GeneratorHandle};
use crate::search::{ContextSource, WebContextFetcher};

/// Shared, read-only state for all requests
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub generator: GeneratorHandle,
    pub context_source: Arc<dyn ContextSource>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        generator: GeneratorHandle,
        context_source: Arc<dyn ContextSource>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            generator,
            context_source,
        }
    }

    /// Wire up the Gemini generator and the web context fetcher
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let generator = check_generator(&config);
        let search_client = build_search_client()?;
        let context_source = Arc::new(WebContextFetcher::new(search_client, &config.search));
        Ok(Self::new(config, generator, context_source))
    }
}

/// Construct the generator once at startup and record why it is unusable, if it is
pub fn check_generator(config: &AppConfig) -> GeneratorHandle {
    if !config.gemini.has_api_key() {
        tracing::warn!("GEMINI_API_KEY is not set; chat requests will be rejected until it is");
    }

    match GeminiGenerator::from_config(&config.gemini) {
        Ok(generator) => {
            tracing::info!(model = %config.gemini.model, "Gemini generator ready");
            GeneratorHandle::ready(Arc::new(generator))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Gemini generator unavailable");
            GeneratorHandle::unavailable("gemini", e.to_string())
        }
    }
}

fn build_search_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("chat-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Build the router with all routes and layers
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/:provider", get(provider_health_handler))
        .route("/api/chat", post(chat_handler))
        .fallback(not_found)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let model = config.gemini.model.clone();

    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("chat-proxy listening on {}", addr);
    tracing::info!("Generating with {}", model);

    Ok(axum::serve(listener, app).await?)
}

/// `POST /api/chat`
async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
    ChatHandler::new(state).handle(request).await
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "not found".to_string(),
        }),
    )
}
