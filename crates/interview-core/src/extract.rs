//! Helpers for pulling structured payloads out of free-form model output.

/// Remove a markdown code fence around the payload, if there is one.
///
/// Handles both a fully fenced response and a fence embedded in prose;
/// text without fences is returned trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    // Skip the language tag on the opening fence line
    let body = match after_open.find('\n') {
        Some(nl) => &after_open[nl + 1..],
        None => after_open,
    };
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// The span from the first `open` to the last `close`, inclusive.
pub fn outermost_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Make text safe for a speech synthesizer: `/` becomes a space, `*` is
/// dropped, and runs of whitespace collapse.
pub fn speech_safe(text: &str) -> String {
    let replaced: String = text
        .chars()
        .filter(|c| *c != '*')
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();
    collapse_whitespace(&replaced)
}
