//! Expiry Sweep Task
//!
//! Background task that periodically removes entries whose stale window
//! has closed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// An entry is only removed once it has been expired for longer than
/// `stale_grace_secs`; until then reads keep serving it flagged as stale.
/// Each sweep runs under the store's write lock and flushes the change
/// notifications it produced before releasing it.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::new(1000, 300)));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 30, 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    cache: Arc<RwLock<CacheStore<Value>>>,
    cleanup_interval_secs: u64,
    stale_grace_secs: i64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));
    let grace_ms = stale_grace_secs.max(0).saturating_mul(1000);

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep with interval of {} seconds, grace {} seconds",
            cleanup_interval_secs, stale_grace_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut cache_guard = cache.write().await;
                let removed = cache_guard.cleanup_expired(grace_ms);
                cache_guard.flush_notifications();
                removed
            };

            if removed > 0 {
                info!("Expiry sweep: removed {} entries", removed);
            } else {
                debug!("Expiry sweep: nothing to remove");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryFields;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = Arc::new(RwLock::new(CacheStore::new(100, 300)));

        {
            let mut cache_guard = cache.write().await;
            cache_guard.set("expire_now", EntryFields::new(Value::from("value"), 0));
        }

        let handle = spawn_cleanup_task(cache.clone(), 1, 0);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let cache_guard = cache.read().await;
            assert!(
                !cache_guard.contains("expire_now"),
                "Expired entry should have been swept"
            );
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_respects_stale_grace() {
        let cache = Arc::new(RwLock::new(CacheStore::new(100, 300)));

        {
            let mut cache_guard = cache.write().await;
            cache_guard.set("stale", EntryFields::new(Value::from("value"), 0));
            cache_guard.set("long_lived", EntryFields::new(Value::from("value"), 3600));
        }

        let handle = spawn_cleanup_task(cache.clone(), 1, 60);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let mut cache_guard = cache.write().await;
            let stale = cache_guard.get_stale("stale").unwrap();
            assert!(stale.stale, "Entry inside the grace window stays readable");
            assert!(cache_guard.get_fresh("long_lived").is_some());
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = Arc::new(RwLock::new(CacheStore::new(100, 300)));

        let handle = spawn_cleanup_task(cache, 1, 0);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
