//! Shared helpers for request handling.

use axum::http::HeaderMap;
use unicode_normalization::UnicodeNormalization;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Join the configured public base URL and an absolute path without doubling slashes.
pub fn public_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Case-folded form used for case-insensitive matching.
///
/// SQLite's `NOCASE` and `LIKE` only fold ASCII, so comparisons run on this key instead.
pub fn search_key(text: &str) -> String {
    text.nfkc().flat_map(char::to_lowercase).collect()
}
