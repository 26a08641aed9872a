//! Shared helpers for config parsing and error reporting.

const MAX_ERROR_TEXT_CHARS: usize = 180;

/// Trim optional text and drop it when nothing is left.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Shorten a response body for error messages and logs.
pub fn compact_text(value: &str) -> String {
    let trimmed = value.trim();
    let mut compact = trimmed
        .chars()
        .take(MAX_ERROR_TEXT_CHARS)
        .collect::<String>()
        .replace('\n', " ");
    if trimmed.chars().count() > MAX_ERROR_TEXT_CHARS {
        compact.push_str("...");
    }
    compact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" secret_abc ".to_string())),
            Some("secret_abc".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("https://api.notion.com"));
        assert!(is_http_url("http://localhost:8080"));
        assert!(!is_http_url("api.notion.com"));
    }

    #[test]
    fn compact_text_truncates_long_bodies() {
        let body = "x".repeat(500);
        let compact = compact_text(&body);
        assert_eq!(compact.len(), MAX_ERROR_TEXT_CHARS + 3);
        assert!(compact.ends_with("..."));
        assert_eq!(compact_text("  short\nbody "), "short body");
    }
}
