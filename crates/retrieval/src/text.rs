//! Text helpers: content fingerprints and char-safe truncation.

use sha2::{Digest, Sha256};

/// SHA-256 (hex) of the first `prefix_chars` characters of `text`.
pub fn fingerprint(text: &str, prefix_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(prefix_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());

    let mut hasher = Sha256::new();
    hasher.update(text[..end].as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First `max_chars` characters of `text`, with "..." appended when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// Like [`truncate_chars`] but backs off to the last word boundary.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let Some((idx, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let truncated = &text[..idx];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_uses_prefix_only() {
        let a = format!("{}{}", "x".repeat(200), "tail one");
        let b = format!("{}{}", "x".repeat(200), "tail two");
        assert_eq!(fingerprint(&a, 200), fingerprint(&b, 200));
        assert_ne!(fingerprint(&a, 208), fingerprint(&b, 208));
        assert_eq!(fingerprint(&a, 200).len(), 64);
    }

    #[test]
    fn test_fingerprint_short_text() {
        assert_eq!(fingerprint("Mali", 200), fingerprint("Mali", 4));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let text = "Côte d'Ivoire économie";
        assert_eq!(truncate_chars(text, 4), "Côte...");
        assert_eq!(truncate_chars(text, 100), text);
    }

    #[test]
    fn test_truncate_snippet_word_boundary() {
        let long = "This is a very long text that needs to be truncated at some point";
        let result = truncate_snippet(long, 30);
        assert_eq!(result, "This is a very long text that...");
        assert_eq!(truncate_snippet("Short text", 100), "Short text");
    }
}
