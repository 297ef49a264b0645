//! Web context lookup through the DuckDuckGo Instant Answer API

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::SearchConfig;

/// Related topics considered when building the context block
const MAX_RELATED: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid search URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of plain-text context for a query
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn fetch_context(&self, query: &str) -> Result<String, FetchError>;
}

/// Fetches and condenses an instant answer for a query
pub struct WebContextFetcher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl WebContextFetcher {
    pub fn new(client: reqwest::Client, config: &SearchConfig) -> Self {
        Self {
            client,
            endpoint: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn request_url(&self, query: &str) -> Result<url::Url, FetchError> {
        Ok(url::Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", query),
                ("format", "json"),
                ("no_redirect", "1"),
                ("no_html", "1"),
            ],
        )?)
    }
}

#[async_trait]
impl ContextSource for WebContextFetcher {
    async fn fetch_context(&self, query: &str) -> Result<String, FetchError> {
        let url = self.request_url(query)?;
        tracing::debug!(url = %url, "Fetching web context");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        // The API labels its JSON as application/x-javascript, so parse the body ourselves
        let body = response.bytes().await?;
        let data: Value = serde_json::from_slice(&body)?;

        let context = reduce_answer(&data);
        tracing::debug!(context_len = context.len(), "Web context assembled");
        Ok(context)
    }
}

/// Reduce an instant-answer payload to heading, summary, source and related links
pub fn reduce_answer(data: &Value) -> String {
    let field = |name: &str| {
        data.get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    let related: Vec<String> = data
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(|topics| {
            topics
                .iter()
                .take(MAX_RELATED)
                .filter_map(|topic| {
                    let text = topic.get("Text").and_then(Value::as_str).filter(|s| !s.is_empty())?;
                    let url = topic.get("FirstURL").and_then(Value::as_str).filter(|s| !s.is_empty())?;
                    Some(format!("- {} ({})", text, url))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut parts = Vec::new();
    if let Some(heading) = field("Heading") {
        parts.push(format!("Heading: {}", heading));
    }
    if let Some(summary) = field("AbstractText") {
        parts.push(format!("Summary: {}", summary));
    }
    if let Some(source) = field("AbstractURL") {
        parts.push(format!("Source: {}", source));
    }
    if !related.is_empty() {
        parts.push(format!("Related:\n{}", related.join("\n")));
    }
    parts.join("\n")
}
