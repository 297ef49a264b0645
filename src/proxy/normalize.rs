//! Conversion of chat messages into the vendor's role/content schema

use crate::api::gemini::{Content, ContentRole};
use crate::api::{Message, Role};

/// Map chat messages onto the two roles Gemini accepts.
///
/// System messages have no Gemini counterpart in `contents`, so they become
/// user turns carrying an explicit instruction.
pub fn normalize_messages(messages: &[Message]) -> Vec<Content> {
    messages.iter().map(to_content).collect()
}

fn to_content(message: &Message) -> Content {
    match message.role {
        Role::User => Content::text(ContentRole::User, message.content.clone()),
        Role::Assistant => Content::text(ContentRole::Model, message.content.clone()),
        Role::System => Content::text(ContentRole::User, format!("Instruction: {}", message.content)),
    }
}

/// Build the system message that carries fetched web context
pub fn context_message(context: &str) -> Message {
    Message::system(format!(
        "You can use the following recent web context to answer. If it's irrelevant, ignore it.\n\n\
         {}\n\nAnswer clearly and cite sources with their URLs if used.",
        context
    ))
}
