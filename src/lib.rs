//! Cache Sync - a request-result cache with cross-tier coherence
//!
//! Stores results keyed by method, url and tags with TTL metadata, LRU
//! eviction and tag/path indexes, and reconciles them against a second
//! cache tier through content hashes and compact metadata exchange.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{CacheError, StorageError};
pub use sync::SyncCoordinator;
pub use tasks::spawn_cleanup_task;
