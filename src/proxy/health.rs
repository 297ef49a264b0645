//! Health endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::server::AppState;
use crate::api::gemini::{Content, ContentRole};
use crate::api::{HealthStatus, ProviderHealth};
use crate::generator::{GenerationParams, Generator, GeneratorError, GeneratorHandle};

/// Longest sample echoed back by the provider check
const SAMPLE_CHARS: usize = 60;

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        gemini_key_present: state.config.gemini.has_api_key(),
    })
}

/// `GET /health/:provider`: one non-streaming "ping" generation
pub async fn provider_health_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> (StatusCode, Json<ProviderHealth>) {
    if provider != state.generator.provider() {
        return (
            StatusCode::NOT_FOUND,
            Json(ProviderHealth {
                ok: false,
                error: Some(format!("unknown provider: {}", provider)),
                ..Default::default()
            }),
        );
    }

    if !state.config.gemini.has_api_key() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ProviderHealth {
                ok: false,
                error: Some("GEMINI_API_KEY is missing".to_string()),
                ..Default::default()
            }),
        );
    }

    match &state.generator {
        GeneratorHandle::Unavailable { provider, reason } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ProviderHealth {
                ok: false,
                model: Some(state.config.gemini.model.clone()),
                error: Some(format!("{} generator not available: {}", provider, reason)),
                ..Default::default()
            }),
        ),
        GeneratorHandle::Ready(generator) => match ping(generator.as_ref()).await {
            Ok(sample) => (
                StatusCode::OK,
                Json(ProviderHealth {
                    ok: true,
                    model: Some(generator.model().to_string()),
                    sample: Some(sample),
                    error: None,
                }),
            ),
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Provider health check failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ProviderHealth {
                        ok: false,
                        model: Some(generator.model().to_string()),
                        error: Some(e.to_string()),
                        ..Default::default()
                    }),
                )
            }
        },
    }
}

/// Send "ping" and return the trimmed start of the reply
pub async fn ping(generator: &dyn Generator) -> Result<String, GeneratorError> {
    let reply = generator
        .generate(
            vec![Content::text(ContentRole::User, "ping")],
            GenerationParams::default(),
        )
        .await?;
    Ok(reply.trim().chars().take(SAMPLE_CHARS).collect())
}
