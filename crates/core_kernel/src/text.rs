//! Text helpers

/// Truncates `text` to at most `max_chars` characters.
///
/// Truncation happens on character boundaries, so multi-byte messages coming
/// back from HTTP servers or database drivers never split a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_unchanged() {
        assert_eq!(truncate_chars("timeout", 2000), "timeout");
    }

    #[test]
    fn test_long_text_is_cut() {
        let text = "x".repeat(2500);
        assert_eq!(truncate_chars(&text, 2000).chars().count(), 2000);
    }

    #[test]
    fn test_multibyte_boundary() {
        assert_eq!(truncate_chars("巴西巴西", 2), "巴西");
    }
}
