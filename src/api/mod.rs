//! Wire types: the browser-facing chat API and the Gemini API

mod chat;
pub mod gemini;

pub use chat::*;
