//! Rough token estimation (~4 characters per token).

use switchyard_types::llm::Message;

/// Approximate token count of `text`. At least 1 for non-empty text.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    if chars == 0 { 0 } else { (chars / 4).max(1) }
}

/// Approximate token count of a message list, system prompt included.
pub fn estimate_messages(system: Option<&str>, messages: &[Message]) -> u64 {
    system.map(estimate_tokens).unwrap_or(0)
        + messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum::<u64>()
}
