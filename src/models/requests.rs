//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{cache_key, MAX_KEY_LENGTH, MAX_VALUE_SIZE};

fn default_method() -> String {
    "GET".to_string()
}

/// Request body for storing a result (PUT /entries)
///
/// The cache key is derived from `method`, `url` and `tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// Request method the result belongs to
    #[serde(default = "default_method")]
    pub method: String,
    /// Request url the result belongs to
    pub url: String,
    /// Locally assigned tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Remotely assigned tags
    #[serde(default)]
    pub remote_tags: Vec<String>,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl SetRequest {
    /// The cache key this request maps to.
    pub fn key(&self) -> String {
        cache_key(&self.method, &self.url, &self.tags)
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_target(&self.method, &self.url, &self.key())
            .or_else(|| validate_value(&self.value))
    }
}

/// Request body for reconciling a fresh response (POST /sync)
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub remote_tags: Vec<String>,
    /// The freshly fetched value
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<i64>,
    /// Transport-encoded facts reported by the remote side
    #[serde(default)]
    pub facts: Option<String>,
}

impl SyncRequest {
    pub fn key(&self) -> String {
        cache_key(&self.method, &self.url, &self.tags)
    }

    pub fn validate(&self) -> Option<String> {
        validate_target(&self.method, &self.url, &self.key())
            .or_else(|| validate_value(&self.value))
    }
}

/// Request body for tag invalidation (POST /invalidate)
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub tags: Vec<String>,
    /// Delete instead of force-expiring
    #[serde(default)]
    pub purge: bool,
}

/// Query string carrying a cache key (`?key=`)
#[derive(Debug, Clone, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

/// Query string carrying a path (`?path=`)
#[derive(Debug, Clone, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

fn validate_target(method: &str, url: &str, key: &str) -> Option<String> {
    if method.trim().is_empty() {
        return Some("Method cannot be empty".to_string());
    }
    if url.trim().is_empty() {
        return Some("Url cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

fn validate_value(value: &Value) -> Option<String> {
    let size = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0);
    if size > MAX_VALUE_SIZE {
        return Some(format!(
            "Value exceeds maximum size of {} bytes",
            MAX_VALUE_SIZE
        ));
    }
    None
}
