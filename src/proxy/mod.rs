//! HTTP chat proxy server

mod error;
mod handler;
mod health;
mod normalize;
pub mod server;
mod streaming;


pub use error::ApiError;
pub use handler::{ChatHandler, MISSING_KEY_ERROR};
pub use health::ping;
pub use normalize::{context_message, normalize_messages};
pub use server::{build_router, check_generator, run_server, AppState};
pub use streaming::{model_error_line, open_fragments, relay, setup_error_line};
