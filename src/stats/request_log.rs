//! Request logging formatter

use crate::api::{ChatRequest, Role};

/// Format a chat request log message in compact format
pub fn format_request_log(request: &ChatRequest, model: &str) -> String {
    let mut parts = vec![
        format!("model={}", model),
        format!("msgs={}", request.messages.len()),
    ];

    if request.use_web_search {
        parts.push("web_search".to_string());
    }

    let system_count = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .count();
    if system_count > 0 {
        parts.push(format!("system={}", system_count));
    }

    if let Some(msg) = request.last_user_message() {
        let normalized = normalize_whitespace(msg);
        if !normalized.is_empty() {
            parts.push(format!("\"{}\"", truncate_message(&normalized)));
        }
    }

    format!("→ {}", parts.join(" "))
}

/// Convert newlines and tabs to single spaces, collapse multiple spaces
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate message according to rules:
/// - If <= 100 chars: show all
/// - If > 100 chars: first 25 + " ... " + last 75
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;
    const ELLIPSIS: &str = " ... ";

    let char_count = s.chars().count();
    if char_count <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = s.chars().take(PREFIX_LEN).collect();
    let suffix: String = s.chars().skip(char_count - SUFFIX_LEN).collect();

    format!("{}{}{}", prefix, ELLIPSIS, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Message;

    fn request(messages: Vec<Message>, use_web_search: bool) -> ChatRequest {
        ChatRequest {
            messages,
            use_web_search,
        }
    }

    #[test]
    fn test_format_request_log_basic() {
        let req = request(vec![Message::user("Hello")], false);

        let log = format_request_log(&req, "gemini-2.0-flash");
        assert_eq!(log, "→ model=gemini-2.0-flash msgs=1 \"Hello\"");
    }

    #[test]
    fn test_format_request_log_with_search_and_system() {
        let req = request(
            vec![
                Message::system("Be terse"),
                Message::user("What is Rust?"),
                Message::assistant("A language."),
                Message::user("Who made it?"),
            ],
            true,
        );

        let log = format_request_log(&req, "m");
        assert!(log.contains("msgs=4"));
        assert!(log.contains("web_search"));
        assert!(log.contains("system=1"));
        assert!(log.ends_with("\"Who made it?\""));
    }

    #[test]
    fn test_format_request_log_without_user_message() {
        let req = request(vec![], true);
        assert_eq!(format_request_log(&req, "m"), "→ model=m msgs=0 web_search");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("hello\nworld"), "hello world");
        assert_eq!(normalize_whitespace("hello\t\tworld"), "hello world");
        assert_eq!(normalize_whitespace("hello\r\nworld"), "hello world");
        assert_eq!(normalize_whitespace("  hello   world "), "hello world");
    }

    #[test]
    fn test_truncate_message_short() {
        let msg = "This is a short message";
        assert_eq!(truncate_message(msg), msg);
    }

    #[test]
    fn test_truncate_message_exactly_100() {
        let msg = "x".repeat(100);
        assert_eq!(truncate_message(&msg).len(), 100);
    }

    #[test]
    fn test_truncate_message_long() {
        let msg = "x".repeat(300);
        let truncated = truncate_message(&msg);
        assert!(truncated.starts_with(&"x".repeat(25)));
        assert!(truncated.contains(" ... "));
        assert!(truncated.ends_with(&"x".repeat(75)));
    }

    #[test]
    fn test_truncate_message_multibyte() {
        let msg = "é".repeat(150);
        let truncated = truncate_message(&msg);
        assert_eq!(truncated.chars().count(), 105);
    }
}
