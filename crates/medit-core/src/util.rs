//! Small text helpers shared by the config layer and the HTTP clients.

const ERROR_BODY_LIMIT: usize = 180;

/// Trim a config value; blank values count as unset.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Whether `value` is an absolute `http(s)://` URL with a host part.
pub fn is_http_url(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    ["http://", "https://"].iter().any(|scheme| {
        lower
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
    })
}

/// Trimmed URL without trailing slashes, so paths can be appended with `/`.
pub fn trim_url(value: &str) -> &str {
    value.trim().trim_end_matches('/')
}

/// Single-line excerpt of a response body for error messages.
pub fn compact_text(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= ERROR_BODY_LIMIT {
        return collapsed;
    }
    let mut excerpt = collapsed
        .chars()
        .take(ERROR_BODY_LIMIT - 3)
        .collect::<String>();
    excerpt.push_str("...");
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_config_values_are_unset() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" tbl_diagrams ".to_string())).as_deref(),
            Some("tbl_diagrams")
        );
    }

    #[test]
    fn http_urls_need_scheme_and_host() {
        assert!(is_http_url("http://localhost:8080"));
        assert!(is_http_url("HTTPS://tables.example.com/api"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("https:///api"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("tables.example.com"));
    }

    #[test]
    fn trim_url_drops_trailing_slashes() {
        assert_eq!(trim_url(" https://tables.example.com/api// "), "https://tables.example.com/api");
    }

    #[test]
    fn compact_text_flattens_and_truncates_bodies() {
        assert_eq!(compact_text("  bad\n  request  "), "bad request");

        let body = "x".repeat(500);
        let excerpt = compact_text(&body);
        assert_eq!(excerpt.chars().count(), 180);
        assert!(excerpt.ends_with("..."));
    }
}
