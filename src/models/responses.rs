//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheEntry, CacheStats};
use crate::sync::{CacheFact, SyncAction, SyncOutcome, SyncState};

/// Response body for reading an entry (GET /entries)
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    pub key: String,
    pub value: Value,
    pub etag: Option<String>,
    /// Whether the entry is past its expiry (served as stale)
    pub expired: bool,
    /// Seconds of freshness left
    pub ttl_remaining: i64,
    pub origin: String,
    pub tags: Vec<String>,
    pub remote_tags: Vec<String>,
}

impl EntryResponse {
    pub fn from_entry(key: impl Into<String>, entry: &CacheEntry<Value>, now: i64) -> Self {
        Self {
            key: key.into(),
            value: entry.data.clone(),
            etag: entry.content_hash.clone(),
            expired: entry.is_expired_at(now),
            ttl_remaining: entry.ttl_remaining_secs(now),
            origin: entry.origin.as_str().to_string(),
            tags: entry.tags.clone(),
            remote_tags: entry.remote_tags.clone(),
        }
    }
}

/// Response body for storing an entry (PUT /entries)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Weak ETag of the stored value
    pub etag: Option<String>,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, etag: Option<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            etag,
        }
    }
}

/// Response body for deleting an entry (DELETE /entries)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for tag invalidation (POST /invalidate)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Number of entries expired or deleted
    pub affected: usize,
    pub purged: bool,
}

/// Response body for path metadata (GET /meta)
#[derive(Debug, Clone, Serialize)]
pub struct MetaResponse {
    pub path: String,
    pub facts: Vec<CacheFact>,
    /// The same facts, transport-encoded
    pub encoded: String,
}

/// Response body for reconciliation (POST /sync)
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub key: String,
    pub state: SyncState,
    pub action: SyncAction,
    pub etag: Option<String>,
    /// `extend-ttl=<n>` when only an extension was issued
    pub directive: Option<String>,
    /// Transport-encoded facts describing the local cache afterwards
    pub facts: String,
}

impl SyncResponse {
    pub fn new(key: impl Into<String>, outcome: SyncOutcome, facts: String) -> Self {
        Self {
            key: key.into(),
            state: outcome.state,
            action: outcome.action,
            etag: outcome.etag,
            directive: outcome.not_modified.map(|reply| reply.directive),
            facts,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub backend_restores: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub dropped_writes: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Hit rate counting only fresh entries
    pub fresh_hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            fresh_hit_rate: stats.fresh_hit_rate(),
            hits: stats.hits,
            stale_hits: stats.stale_hits,
            misses: stats.misses,
            backend_restores: stats.backend_restores,
            evictions: stats.evictions,
            invalidations: stats.invalidations,
            dropped_writes: stats.dropped_writes,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
