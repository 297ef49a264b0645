//! Relaying generated text to the client as a plain-text stream

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryFutureExt};
use std::convert::Infallible;
use std::sync::Arc;

use crate::api::gemini::Content;
use crate::generator::{GenerationParams, Generator, GeneratorError, TextStream};
use crate::stats::StreamRecorder;

/// Response body chunks; failures are rendered as text, never as stream errors
pub type ByteStream = BoxStream<'static, Result<Bytes, Infallible>>;

/// Open the generation call lazily, on first poll of the returned stream.
///
/// An error opening the call comes out of the stream like any mid-stream error.
pub fn open_fragments(
    generator: Arc<dyn Generator>,
    contents: Vec<Content>,
    params: GenerationParams,
) -> TextStream {
    async move { generator.stream_generate(contents, params).await }
        .try_flatten_stream()
        .boxed()
}

pub fn model_error_line(error: &GeneratorError) -> String {
    format!("\n[model error] {}", error)
}

pub fn setup_error_line(provider: &str, reason: &str) -> String {
    format!("[setup error] {} generator not available: {}", provider, reason)
}

struct Relay {
    fragments: TextStream,
    recorder: StreamRecorder,
    done: bool,
}

/// Forward each fragment as soon as it arrives. The first error is appended
/// as a final line and ends the body; text already sent stays sent.
///
/// Dropping the returned stream (client disconnect) drops the upstream
/// response with it.
pub fn relay(fragments: TextStream, recorder: StreamRecorder) -> ByteStream {
    let state = Relay {
        fragments,
        recorder,
        done: false,
    };

    stream::unfold(state, |mut relay| async move {
        if relay.done {
            return None;
        }

        loop {
            match relay.fragments.next().await {
                Some(Ok(text)) => {
                    if text.is_empty() {
                        continue;
                    }
                    relay.recorder.record_fragment(text.len());
                    return Some((Ok(Bytes::from(text)), relay));
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Generation failed, appending error line");
                    let line = model_error_line(&e);
                    relay.recorder.record_error_line(line.len(), &e.to_string());
                    relay.done = true;
                    return Some((Ok(Bytes::from(line)), relay));
                }
                None => {
                    relay.recorder.complete();
                    return None;
                }
            }
        }
    })
    .boxed()
}

/// Body for a generator that failed its startup check: one line, then end
pub fn setup_error_body(provider: &str, reason: &str, mut recorder: StreamRecorder) -> ByteStream {
    let line = setup_error_line(provider, reason);
    tracing::error!(provider = provider, reason = reason, "Generator unavailable");
    recorder.record_error_line(line.len(), reason);
    drop(recorder);

    stream::once(async move { Ok(Bytes::from(line)) }).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::gemini::ContentRole;
    use crate::config::StatsFormat;
    use crate::stats::StreamMetrics;
    use async_trait::async_trait;
    use futures::Stream;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use uuid::Uuid;

    fn recorder() -> StreamRecorder {
        StreamRecorder::new(StreamMetrics::new(Uuid::new_v4(), "test", 1, false), None)
    }

    fn scripted(items: Vec<Result<&str, GeneratorError>>) -> TextStream {
        let items: Vec<Result<String, GeneratorError>> =
            items.into_iter().map(|r| r.map(str::to_string)).collect();
        stream::iter(items).boxed()
    }

    async fn collect_body(body: ByteStream) -> Vec<String> {
        body.map(|chunk| String::from_utf8(chunk.unwrap().to_vec()).unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_relay_forwards_fragments_in_order() {
        let body = relay(scripted(vec![Ok("a"), Ok("b"), Ok("c")]), recorder());
        assert_eq!(collect_body(body).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_relay_appends_error_line() {
        let body = relay(
            scripted(vec![
                Ok("Hel"),
                Ok("lo"),
                Err(GeneratorError::Network("connection reset".to_string())),
                Ok("never sent"),
            ]),
            recorder(),
        );

        let chunks = collect_body(body).await;
        assert_eq!(chunks.len(), 3);
        let text = chunks.concat();
        assert!(text.starts_with("Hello\n[model error]"));
        assert_eq!(text, "Hello\n[model error] network error: connection reset");
    }

    #[tokio::test]
    async fn test_relay_skips_empty_fragments() {
        let body = relay(scripted(vec![Ok(""), Ok("x"), Ok("")]), recorder());
        assert_eq!(collect_body(body).await, vec!["x"]);
    }

    #[tokio::test]
    async fn test_setup_error_body_single_line() {
        let body = setup_error_body("gemini", "client init failed", recorder());
        assert_eq!(
            collect_body(body).await,
            vec!["[setup error] gemini generator not available: client init failed"]
        );
    }

    struct CountingGenerator {
        opened: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        fn provider(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "counting-1"
        }

        async fn stream_generate(
            &self,
            _contents: Vec<Content>,
            _params: GenerationParams,
        ) -> Result<TextStream, GeneratorError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeneratorError::Api {
                    status: 403,
                    message: "API key not valid".to_string(),
                });
            }
            Ok(scripted(vec![Ok("ok")]))
        }
    }

    #[tokio::test]
    async fn test_open_fragments_is_lazy() {
        let generator = Arc::new(CountingGenerator {
            opened: AtomicUsize::new(0),
            fail: false,
        });
        let contents = vec![Content::text(ContentRole::User, "hi")];

        let fragments = open_fragments(generator.clone(), contents, GenerationParams::default());
        assert_eq!(generator.opened.load(Ordering::SeqCst), 0);

        let items: Vec<_> = fragments.collect().await;
        assert_eq!(generator.opened.load(Ordering::SeqCst), 1);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_becomes_error_line() {
        let generator = Arc::new(CountingGenerator {
            opened: AtomicUsize::new(0),
            fail: true,
        });
        let fragments = open_fragments(generator, vec![], GenerationParams::default());

        let text = collect_body(relay(fragments, recorder())).await.concat();
        assert_eq!(text, "\n[model error] API error (HTTP 403): API key not valid");
    }

    /// Sets its flag when the upstream it rides along with is dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Yields one fragment, then never finishes
    struct Stalled {
        inner: TextStream,
        _flag: DropFlag,
    }

    impl Stream for Stalled {
        type Item = Result<String, GeneratorError>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.inner.poll_next_unpin(cx)
        }
    }

    fn stalled(dropped: &Arc<AtomicBool>) -> TextStream {
        Stalled {
            inner: stream::once(async { Ok::<_, GeneratorError>("first".to_string()) })
                .chain(stream::pending())
                .boxed(),
            _flag: DropFlag(dropped.clone()),
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_relay_forwards_before_upstream_ends() {
        let dropped = Arc::new(AtomicBool::new(false));
        let mut body = relay(stalled(&dropped), recorder());

        let first = tokio::time::timeout(Duration::from_secs(1), body.next())
            .await
            .expect("first fragment waited for the upstream to finish");
        assert_eq!(first.unwrap().unwrap(), Bytes::from("first"));
        assert!(!dropped.load(Ordering::SeqCst));

        drop(body);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dropped_body_logs_client_disconnect() {
        let dropped = Arc::new(AtomicBool::new(false));
        let recorder = StreamRecorder::new(
            StreamMetrics::new(Uuid::new_v4(), "test", 1, false),
            Some(StatsFormat::Compact),
        );
        let mut body = relay(stalled(&dropped), recorder);
        assert!(body.next().await.is_some());

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || drop(body));

        assert!(dropped.load(Ordering::SeqCst));
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("fragments=1"));
        assert!(output.contains("client disconnected"));
    }
}
