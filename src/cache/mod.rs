//! Cache Module
//!
//! In-memory request cache with TTL metadata, LRU eviction, tag and path
//! indexes and coalesced change notification.

pub mod backend;
mod entry;
mod index;
pub mod keys;
mod lru;
mod notifier;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{MemoryBackend, StorageBackend, UnavailableBackend};
pub use entry::{
    compute_expiry, current_timestamp_ms, filter_sidecar_headers, is_expired, normalize_tags,
    CacheEntry, EntryFields, EntryPatch, Origin, SIDECAR_HEADER_WHITELIST,
};
pub use index::{PathIndex, TagIndex};
pub use keys::{cache_key, normalize_path, origin_path, parse_key};
pub use lru::RecencyMap;
pub use notifier::{Listener, Notifier, Subscription};
pub use stats::CacheStats;
pub use store::{CacheStore, StaleRead};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 2048;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
