//! Cache key construction and parsing.
//!
//! Keys have the form `{METHOD}:{url}|tags:{sorted,comma,separated}` so that
//! two logically identical requests collapse onto one entry.

use super::entry::normalize_tags;

const TAGS_MARKER: &str = "|tags:";

/// Builds the canonical key for a request.
pub fn cache_key<S: AsRef<str>>(method: &str, url: &str, tags: &[S]) -> String {
    format!(
        "{}:{}{}{}",
        method.trim().to_ascii_uppercase(),
        url.trim(),
        TAGS_MARKER,
        normalize_tags(tags).join(",")
    )
}

/// Splits a key into `(method, url, tags)`. Returns `None` for keys not
/// produced by [`cache_key`].
pub fn parse_key(key: &str) -> Option<(&str, &str, Vec<String>)> {
    let (method, rest) = key.split_once(':')?;
    let (url, tags) = rest.rsplit_once(TAGS_MARKER)?;
    if method.is_empty() {
        return None;
    }
    let tags: Vec<&str> = tags.split(',').collect();
    Some((method, url, normalize_tags(&tags)))
}

/// The normalized path a key originated from, if the key is well formed.
pub fn origin_path(key: &str) -> Option<String> {
    parse_key(key).map(|(_, url, _)| normalize_path(url))
}

/// Reduces a url or path to its path component.
///
/// Query and fragment are cut first, so a url nested in a query string is
/// never mistaken for the authority. Scheme and authority are dropped, a
/// trailing slash is removed (except for the root) and an empty path becomes
/// `/`.
pub fn normalize_path(url: &str) -> String {
    let url = url.trim();
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    let url = &url[..end];
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => url,
    };
    let path = path.trim_end_matches('/');

    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
