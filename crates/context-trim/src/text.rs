//! Helpers for cleaning up model output before it re-enters a conversation.

use once_cell::sync::Lazy;
use regex::Regex;

static REASONING_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(?:thinking|think)>.*?</(?:thinking|think)>")
        .expect("reasoning regex is valid")
});

/// Contents of every fenced block tagged `tag`, joined by newlines and trimmed.
///
/// Matches the text between ```` ```tag ```` and the next closing fence, across
/// lines. An empty string means no block was found.
pub fn extract_fenced(text: &str, tag: &str) -> String {
    let pattern = format!(r"(?s)```{}(.*?)```", regex::escape(tag));
    let Ok(fence) = Regex::new(&pattern) else {
        return String::new();
    };

    fence
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Remove the first `<think>` or `<thinking>` block from `text`.
pub fn strip_reasoning(text: &str) -> String {
    REASONING_BLOCK.replace(text, "").into_owned()
}
