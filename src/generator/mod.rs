//! Text generation backends
//!
//! The proxy talks to the vendor only through [`Generator`], so the HTTP
//! client can be swapped for a scripted fake in tests.

mod gemini;
mod sse;

pub use gemini::GeminiGenerator;
pub use sse::SseDecoder;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

use crate::api::gemini::Content;

/// Lazily produced text fragments, in arrival order
pub type TextStream = BoxStream<'static, Result<String, GeneratorError>>;

/// Sampling parameters sent with every generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    /// Generator misconfigured (missing API key, bad URL)
    #[error("config error: {0}")]
    Config(String),

    /// Timeout, DNS, connection refused or a broken body stream
    #[error("network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("prompt blocked: {0}")]
    Blocked(String),
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name used in health routes and error lines (e.g. "gemini")
    fn provider(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Open a streaming generation call.
    ///
    /// Errors returned here happen before any fragment is produced; errors
    /// inside the stream end it.
    async fn stream_generate(
        &self,
        contents: Vec<Content>,
        params: GenerationParams,
    ) -> Result<TextStream, GeneratorError>;

    /// One-shot generation, draining the stream into a single string
    async fn generate(
        &self,
        contents: Vec<Content>,
        params: GenerationParams,
    ) -> Result<String, GeneratorError> {
        let mut stream = self.stream_generate(contents, params).await?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Result of the startup capability check
#[derive(Clone)]
pub enum GeneratorHandle {
    Ready(Arc<dyn Generator>),
    Unavailable { provider: String, reason: String },
}

impl GeneratorHandle {
    pub fn ready(generator: Arc<dyn Generator>) -> Self {
        GeneratorHandle::Ready(generator)
    }

    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        GeneratorHandle::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            GeneratorHandle::Ready(g) => g.provider(),
            GeneratorHandle::Unavailable { provider, .. } => provider,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, GeneratorHandle::Ready(_))
    }
}

impl std::fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorHandle::Ready(g) => f
                .debug_struct("Ready")
                .field("provider", &g.provider())
                .field("model", &g.model())
                .finish(),
            GeneratorHandle::Unavailable { provider, reason } => f
                .debug_struct("Unavailable")
                .field("provider", provider)
                .field("reason", reason)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::gemini::ContentRole;
    use futures::stream;

    struct Scripted(Vec<Result<String, GeneratorError>>);

    #[async_trait]
    impl Generator for Scripted {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn stream_generate(
            &self,
            _contents: Vec<Content>,
            _params: GenerationParams,
        ) -> Result<TextStream, GeneratorError> {
            Ok(stream::iter(self.0.clone()).boxed())
        }
    }

    fn ping() -> Vec<Content> {
        vec![Content::text(ContentRole::User, "ping")]
    }

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.max_output_tokens, 512);
    }

    #[tokio::test]
    async fn test_generate_drains_stream() {
        let generator = Scripted(vec![Ok("po".to_string()), Ok("ng".to_string())]);
        let text = generator.generate(ping(), GenerationParams::default()).await.unwrap();
        assert_eq!(text, "pong");
    }

    #[tokio::test]
    async fn test_generate_surfaces_stream_error() {
        let generator = Scripted(vec![
            Ok("po".to_string()),
            Err(GeneratorError::Network("reset".to_string())),
        ]);
        let err = generator.generate(ping(), GenerationParams::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "network error: reset");
    }

    #[test]
    fn test_handle_provider() {
        let ready = GeneratorHandle::ready(Arc::new(Scripted(vec![])));
        assert!(ready.is_ready());
        assert_eq!(ready.provider(), "scripted");

        let missing = GeneratorHandle::unavailable("gemini", "no client");
        assert!(!missing.is_ready());
        assert_eq!(missing.provider(), "gemini");
    }

    #[test]
    fn test_error_display() {
        let err = GeneratorError::Api {
            status: 429,
            message: "Resource has been exhausted".to_string(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 429): Resource has been exhausted");
    }
}
