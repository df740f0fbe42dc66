//! Cache metadata codec.
//!
//! Carries a bounded list of cache facts across a transport boundary as
//! base64-encoded JSON. Neither direction ever fails: oversized input is
//! truncated to a decodable prefix, malformed input decodes to nothing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest serialized JSON accepted before truncation.
pub const MAX_METADATA_BYTES: usize = 8192;

/// Room left below the cap once truncation kicks in.
pub const TRUNCATION_HEADROOM: usize = 256;

// == Cache Fact ==
/// What one side of the protocol believes about a single cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFact {
    pub cache_key: String,
    /// Seconds of freshness left; zero means stale
    pub ttl_remaining: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl CacheFact {
    pub fn new(cache_key: impl Into<String>, ttl_remaining: i64) -> Self {
        Self {
            cache_key: cache_key.into(),
            ttl_remaining,
            hash: None,
            tags: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

// == Encode ==
/// Serializes facts for transport.
///
/// When the JSON exceeds [`MAX_METADATA_BYTES`], trailing facts are dropped
/// until it fits under the cap minus [`TRUNCATION_HEADROOM`].
pub fn encode(facts: &[CacheFact]) -> String {
    let json = match serde_json::to_string(facts) {
        Ok(json) => json,
        Err(err) => {
            warn!("Failed to serialize cache metadata: {}", err);
            return STANDARD.encode("[]");
        }
    };

    if json.len() <= MAX_METADATA_BYTES {
        return STANDARD.encode(json);
    }

    let budget = MAX_METADATA_BYTES - TRUNCATION_HEADROOM;
    let kept = fitting_prefix(facts, budget);
    warn!(
        "Cache metadata is {} bytes (limit {}); truncated from {} to {} facts",
        json.len(),
        MAX_METADATA_BYTES,
        facts.len(),
        kept.len()
    );
    let json = serde_json::to_string(kept).unwrap_or_else(|_| "[]".to_string());
    STANDARD.encode(json)
}

/// Longest prefix of `facts` whose JSON array fits in `budget` bytes.
fn fitting_prefix(facts: &[CacheFact], budget: usize) -> &[CacheFact] {
    // "[" + "]" plus a comma between elements
    let mut used: usize = 2;
    for (i, fact) in facts.iter().enumerate() {
        let len = serde_json::to_string(fact).map(|s| s.len()).unwrap_or(usize::MAX);
        let separator = usize::from(i > 0);
        if used.saturating_add(len).saturating_add(separator) > budget {
            return &facts[..i];
        }
        used += len + separator;
    }
    facts
}

// == Decode ==
/// Parses transported facts; any malformation yields an empty list.
pub fn decode(encoded: &str) -> Vec<CacheFact> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Vec::new();
    }

    let bytes = match STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Discarding cache metadata with invalid encoding: {}", err);
            return Vec::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(facts) => facts,
        Err(err) => {
            warn!("Discarding unparseable cache metadata: {}", err);
            Vec::new()
        }
    }
}
