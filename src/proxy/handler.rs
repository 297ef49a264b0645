//! Chat request handler: augmentation, normalization, streaming

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use uuid::Uuid;

use super::error::ApiError;
use super::normalize::{context_message, normalize_messages};
use super::server::AppState;
use super::streaming::{open_fragments, relay, setup_error_body};
use crate::api::{ChatRequest, Message};
use crate::generator::{GenerationParams, GeneratorHandle};
use crate::stats::{format_request_log, StreamMetrics, StreamRecorder};

pub const MISSING_KEY_ERROR: &str =
    "GEMINI_API_KEY is not set. Add it to your .env or environment variables.";

/// Chat request handler
pub struct ChatHandler {
    state: AppState,
}

impl ChatHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Handle one chat request, returning a streaming plain-text response
    pub async fn handle(&self, request: ChatRequest) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4();
        let config = &self.state.config;

        tracing::info!(
            request_id = %request_id,
            "{}",
            format_request_log(&request, &config.gemini.model)
        );

        if !config.gemini.has_api_key() {
            return Err(ApiError::Configuration(MISSING_KEY_ERROR.to_string()));
        }

        let (messages, augmented) = self.augment(request).await;
        let contents = normalize_messages(&messages);

        let model = match &self.state.generator {
            GeneratorHandle::Ready(generator) => generator.model().to_string(),
            GeneratorHandle::Unavailable { .. } => config.gemini.model.clone(),
        };
        let stats_format = config.stats.enabled.then_some(config.stats.format);
        let recorder = StreamRecorder::new(
            StreamMetrics::new(request_id, &model, contents.len(), augmented),
            stats_format,
        );

        let body = match &self.state.generator {
            GeneratorHandle::Ready(generator) => relay(
                open_fragments(generator.clone(), contents, GenerationParams::default()),
                recorder,
            ),
            GeneratorHandle::Unavailable { provider, reason } => {
                setup_error_body(provider, reason, recorder)
            }
        };

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(body))
            .map_err(|e| ApiError::Internal(format!("failed to build response: {}", e)))
    }

    /// Prepend web context when requested. Lookup failures are logged and
    /// otherwise ignored; the conversation goes out unchanged.
    async fn augment(&self, request: ChatRequest) -> (Vec<Message>, bool) {
        if !request.use_web_search {
            return (request.messages, false);
        }

        let query = request
            .last_user_message()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if query.is_empty() {
            tracing::debug!("Web search requested without a user message, skipping");
            return (request.messages, false);
        }

        match self.state.context_source.fetch_context(&query).await {
            Ok(context) => {
                tracing::debug!(context_len = context.len(), "Prepending web context");
                let mut messages = Vec::with_capacity(request.messages.len() + 1);
                messages.push(context_message(&context));
                messages.extend(request.messages);
                (messages, true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Web context fetch failed, continuing without it");
                (request.messages, false)
            }
        }
    }
}
