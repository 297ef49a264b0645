//! chat-proxy: streaming chat proxy in front of Google Gemini
//!
//! Features:
//! - Plain-text streaming of Gemini responses over HTTP
//! - Optional DuckDuckGo instant-answer context for the latest question
//! - Per-stream stats logging (fragments, bytes, first-fragment latency)

pub mod api;
pub mod config;
pub mod generator;
pub mod proxy;
pub mod search;
pub mod stats;

pub use config::AppConfig;
pub use proxy::run_server;
