//! Cache Entry Module
//!
//! Defines individual cache entries and the pure lifecycle functions that
//! govern them: TTL to expiry conversion, expiry testing and tag
//! canonicalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// == Origin ==
/// Where a cache entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Written after a successful remote fetch
    Fetched,
    /// Seeded from a startup snapshot
    Hydrated,
    /// Written explicitly by the caller
    Manual,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Fetched => "fetched",
            Origin::Hydrated => "hydrated",
            Origin::Manual => "manual",
        }
    }
}

// == Cache Entry ==
/// Represents a single cached request result with its coherence metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The cached value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: i64,
    /// Lifetime requested when the entry was written or last extended
    pub ttl_seconds: i64,
    /// Locally assigned tags, canonical
    pub tags: Vec<String>,
    /// Remotely assigned tags, canonical
    pub remote_tags: Vec<String>,
    /// Last known weak ETag of `data`
    pub content_hash: Option<String>,
    pub origin: Origin,
    /// Last read or write (Unix milliseconds)
    pub last_accessed: i64,
    /// Whitelisted transport headers kept for replay
    pub sidecar_headers: Option<BTreeMap<String, String>>,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Builds an entry from caller-supplied fields at time `now`.
    pub fn from_fields(fields: EntryFields<T>, now: i64) -> Self {
        Self {
            data: fields.data,
            created_at: now,
            expires_at: compute_expiry(now, fields.ttl_seconds),
            ttl_seconds: fields.ttl_seconds,
            tags: normalize_tags(&fields.tags),
            remote_tags: normalize_tags(&fields.remote_tags),
            content_hash: fields.content_hash,
            origin: fields.origin.unwrap_or(Origin::Manual),
            last_accessed: now,
            sidecar_headers: fields.sidecar_headers.map(filter_sidecar_headers),
        }
    }

    // == Is Expired ==
    /// Checks expiry against the current wall clock.
    pub fn is_expired(&self) -> bool {
        is_expired(self, current_timestamp_ms())
    }

    /// Checks expiry against an explicit timestamp.
    pub fn is_expired_at(&self, now: i64) -> bool {
        is_expired(self, now)
    }

    // == Time To Live ==
    /// Whole seconds of freshness left at `now`, zero once expired.
    pub fn ttl_remaining_secs(&self, now: i64) -> i64 {
        if self.expires_at > now {
            (self.expires_at - now) / 1000
        } else {
            0
        }
    }

    /// Union of local and remote tags, canonical.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags = self.tags.clone();
        tags.extend(self.remote_tags.iter().cloned());
        normalize_tags(&tags)
    }
}

// == Entry Fields ==
/// Everything a caller provides when writing an entry with `set`.
#[derive(Debug, Clone)]
pub struct EntryFields<T> {
    pub data: T,
    pub ttl_seconds: i64,
    pub tags: Vec<String>,
    pub remote_tags: Vec<String>,
    pub content_hash: Option<String>,
    /// `None` keeps the origin of the entry being replaced, or `Manual`
    pub origin: Option<Origin>,
    pub sidecar_headers: Option<BTreeMap<String, String>>,
}

impl<T> EntryFields<T> {
    /// Minimal manual write: no tags, no hash.
    pub fn new(data: T, ttl_seconds: i64) -> Self {
        Self {
            data,
            ttl_seconds,
            tags: Vec::new(),
            remote_tags: Vec::new(),
            content_hash: None,
            origin: None,
            sidecar_headers: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_remote_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remote_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.sidecar_headers = Some(headers);
        self
    }
}

// == Entry Patch ==
/// Partial update applied by `update`. `None` leaves a field untouched.
#[derive(Debug, Clone)]
pub struct EntryPatch<T> {
    pub data: Option<T>,
    pub ttl_seconds: Option<i64>,
    pub expires_at: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub remote_tags: Option<Vec<String>>,
    pub content_hash: Option<String>,
    pub origin: Option<Origin>,
    pub sidecar_headers: Option<BTreeMap<String, String>>,
}

impl<T> Default for EntryPatch<T> {
    fn default() -> Self {
        Self {
            data: None,
            ttl_seconds: None,
            expires_at: None,
            tags: None,
            remote_tags: None,
            content_hash: None,
            origin: None,
            sidecar_headers: None,
        }
    }
}

impl<T> EntryPatch<T> {
    /// Patch that only extends the lifetime of an entry.
    pub fn extend(ttl_seconds: i64) -> Self {
        Self {
            ttl_seconds: Some(ttl_seconds),
            ..Self::default()
        }
    }
}

// == Lifecycle Functions ==
/// Converts a TTL into an absolute expiry.
///
/// A non-positive TTL lands one second in the past so the entry is already
/// expired at its own creation instant.
pub fn compute_expiry(now: i64, ttl_seconds: i64) -> i64 {
    if ttl_seconds > 0 {
        now + ttl_seconds * 1000
    } else {
        now - 1000
    }
}

/// An entry is expired strictly after its expiry timestamp.
pub fn is_expired<T>(entry: &CacheEntry<T>, now: i64) -> bool {
    now > entry.expires_at
}

/// Trims, drops empties, deduplicates and sorts.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = tags
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Transport headers worth keeping alongside an entry.
pub const SIDECAR_HEADER_WHITELIST: &[&str] = &[
    "etag",
    "cache-control",
    "last-modified",
    "x-cache-tags",
    "x-cache-directive",
];

/// Keeps only whitelisted headers, with lower-cased names.
pub fn filter_sidecar_headers(headers: BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .filter(|(name, _)| SIDECAR_HEADER_WHITELIST.contains(&name.as_str()))
        .collect()
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
