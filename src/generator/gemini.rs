//! Gemini streaming client (`streamGenerateContent?alt=sse`)

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;

use super::{GenerationParams, Generator, GeneratorError, SseDecoder, TextStream};
use crate::api::gemini::{
    Content, GeminiError, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
};
use crate::config::GeminiConfig;

pub struct GeminiGenerator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    /// Build the client. This is the startup capability check: a missing key
    /// or a client that cannot be constructed makes the generator unavailable.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, GeneratorError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| GeneratorError::Config("GEMINI_API_KEY is not set".to_string()))?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| GeneratorError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::new(api_key, config.model.clone(), config.base_url().to_string(), client))
    }

    pub fn new(api_key: String, model: String, base_url: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_generate(
        &self,
        contents: Vec<Content>,
        params: GenerationParams,
    ) -> Result<TextStream, GeneratorError> {
        let request = GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        };

        tracing::debug!(
            model = %self.model,
            contents = request.contents.len(),
            "Opening Gemini stream"
        );

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Gemini API returned error status");
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(decode_stream(response.bytes_stream().boxed()))
    }
}

/// Prefer the vendor's `error.message` over the raw body
fn api_error(status: u16, body: &str) -> GeneratorError {
    let message = match serde_json::from_str::<GeminiError>(body) {
        Ok(err) => err.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    };
    GeneratorError::Api { status, message }
}

/// Finish reasons that end a candidate without withholding text
const NORMAL_FINISH: &[&str] = &["STOP", "MAX_TOKENS", "FINISH_REASON_UNSPECIFIED"];

/// Interpret one SSE payload. `Ok(None)` means the event carried no text.
fn parse_event(payload: &str) -> Result<Option<String>, GeneratorError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| GeneratorError::Parse(format!("invalid stream event: {}", e)))?;

    if value.get("error").is_some() {
        let err: GeminiError = serde_json::from_value(value)
            .map_err(|e| GeneratorError::Parse(format!("invalid error event: {}", e)))?;
        return Err(GeneratorError::Api {
            status: err.error.code.unwrap_or(500),
            message: err.error.message,
        });
    }

    let chunk: GenerateContentResponse = serde_json::from_value(value)
        .map_err(|e| GeneratorError::Parse(format!("unexpected stream event: {}", e)))?;

    if let Some(reason) = chunk.block_reason() {
        return Err(GeneratorError::Blocked(reason.to_string()));
    }

    let text = chunk.text();
    if !text.is_empty() {
        return Ok(Some(text));
    }

    // A candidate cut off by a safety or recitation filter arrives with no parts
    match chunk.finish_reason() {
        Some(reason) if !NORMAL_FINISH.contains(&reason) => {
            Err(GeneratorError::Blocked(reason.to_string()))
        }
        _ => Ok(None),
    }
}

struct Decoding {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn the raw SSE body into text fragments; the first error ends the stream
fn decode_stream(body: BoxStream<'static, reqwest::Result<Bytes>>) -> TextStream {
    let state = Decoding {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                match parse_event(&payload) {
                    Ok(Some(text)) => return Some((Ok(text), st)),
                    Ok(None) => continue,
                    Err(e) => {
                        st.finished = true;
                        st.pending.clear();
                        return Some((Err(e), st));
                    }
                }
            }

            if st.finished {
                return None;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    tracing::trace!("Gemini chunk received: {} bytes", chunk.len());
                    let events = st.decoder.push(&chunk);
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(GeneratorError::Network(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    let tail = st.decoder.finish();
                    st.pending.extend(tail);
                }
            }
        }
    })
    .boxed()
}
