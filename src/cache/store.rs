//! Cache Store Module
//!
//! Main cache engine: recency-ordered primary map with LRU eviction, tag and
//! path indexes, coalesced change notification and an optional backing tier.
//!
//! Every operation here is synchronous. Shared use must wrap the store in a
//! single lock so the check-size, evict, insert sequence stays atomic.

use std::collections::BTreeSet;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::backend::StorageBackend;
use crate::cache::entry::{
    compute_expiry, current_timestamp_ms, filter_sidecar_headers, normalize_tags, CacheEntry,
    EntryFields, EntryPatch, Origin,
};
use crate::cache::index::{PathIndex, TagIndex};
use crate::cache::keys::{normalize_path, origin_path};
use crate::cache::lru::RecencyMap;
use crate::cache::notifier::{Listener, Notifier, Subscription};
use crate::cache::CacheStats;
use crate::error::StorageError;
use crate::sync::CacheFact;

// == Stale Read ==
/// An entry returned regardless of freshness, flagged when stale.
#[derive(Debug)]
pub struct StaleRead<'a, T> {
    pub entry: &'a CacheEntry<T>,
    pub stale: bool,
}

// == Cache Store ==
/// Main cache storage with LRU eviction and TTL metadata.
pub struct CacheStore<T> {
    /// Primary map, oldest first
    entries: RecencyMap<CacheEntry<T>>,
    tags: TagIndex,
    paths: PathIndex,
    notifier: Notifier<CacheEntry<T>>,
    /// Optional write-through tier mirroring the live entries
    backend: Option<Box<dyn StorageBackend>>,
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Default TTL in seconds for writes without an explicit TTL
    default_ttl: i64,
}

impl<T> CacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    // == Constructor ==
    /// Creates a new in-memory store.
    ///
    /// # Arguments
    /// * `max_size` - Maximum number of entries (at least 1)
    /// * `default_ttl` - Default TTL in seconds for writes without explicit TTL
    pub fn new(max_size: usize, default_ttl: i64) -> Self {
        Self {
            entries: RecencyMap::new(),
            tags: TagIndex::new(),
            paths: PathIndex::new(),
            notifier: Notifier::new(),
            backend: None,
            stats: CacheStats::new(),
            max_size: max_size.max(1),
            default_ttl,
        }
    }

    /// Attaches a backing tier that live entries are written through to.
    pub fn with_backend(mut self, backend: Box<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    // == Get ==
    /// Returns the entry for `key` and marks it most recently used.
    ///
    /// Expiry is not evaluated; staleness is the caller's concern. A memory
    /// miss falls through to the backing tier when one is attached.
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry<T>> {
        let now = current_timestamp_ms();

        if self.entries.contains(key) {
            let entry = self.entries.get_mut(key)?;
            entry.last_accessed = now;
            self.stats.record_hit(entry.is_expired_at(now));
            return Some(&*entry);
        }

        if self.restore_from_backend(key, now) {
            self.stats.record_restore();
            let entry = self.entries.peek(key)?;
            self.stats.record_hit(entry.is_expired_at(now));
            Some(entry)
        } else {
            self.stats.record_miss();
            None
        }
    }

    /// Like `get`, but expired entries read as a miss.
    pub fn get_fresh(&mut self, key: &str) -> Option<&CacheEntry<T>> {
        let now = current_timestamp_ms();
        self.get(key).filter(|entry| !entry.is_expired_at(now))
    }

    /// Like `get`, but reports whether the returned entry is stale.
    pub fn get_stale(&mut self, key: &str) -> Option<StaleRead<'_, T>> {
        let now = current_timestamp_ms();
        self.get(key).map(|entry| StaleRead {
            stale: entry.is_expired_at(now),
            entry,
        })
    }

    /// Reads an entry without touching recency or stats.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.peek(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    // == Set ==
    /// Writes an entry.
    ///
    /// An existing key is replaced in place and touched, keeping its origin
    /// unless `fields` names one. A new key arriving at capacity first evicts
    /// the least recently touched entry.
    pub fn set(&mut self, key: &str, mut fields: EntryFields<T>) {
        if fields.origin.is_none() {
            fields.origin = self.entries.peek(key).map(|previous| previous.origin);
        }
        let entry = CacheEntry::from_fields(fields, current_timestamp_ms());
        self.insert_entry(key, entry);
        self.write_through(key);
    }

    // == Update ==
    /// Merges `patch` into an existing entry. Returns false when absent.
    ///
    /// A positive `ttl_seconds` without an explicit `expires_at` restarts the
    /// expiry clock. `origin` is kept unless the patch overrides it.
    pub fn update(&mut self, key: &str, patch: EntryPatch<T>) -> bool {
        let now = current_timestamp_ms();
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let old_tags = entry.all_tags();

        if let Some(data) = patch.data {
            entry.data = data;
        }
        if let Some(ttl) = patch.ttl_seconds {
            entry.ttl_seconds = ttl;
        }
        match (patch.expires_at, patch.ttl_seconds) {
            (Some(expires_at), _) => entry.expires_at = expires_at,
            (None, Some(ttl)) if ttl > 0 => entry.expires_at = compute_expiry(now, ttl),
            _ => {}
        }
        if let Some(tags) = patch.tags {
            entry.tags = normalize_tags(&tags);
        }
        if let Some(tags) = patch.remote_tags {
            entry.remote_tags = normalize_tags(&tags);
        }
        if let Some(hash) = patch.content_hash {
            entry.content_hash = Some(hash);
        }
        if let Some(origin) = patch.origin {
            entry.origin = origin;
        }
        if let Some(headers) = patch.sidecar_headers {
            entry.sidecar_headers = Some(filter_sidecar_headers(headers));
        }
        entry.last_accessed = now;

        let new_tags = entry.all_tags();

        if old_tags != new_tags {
            self.tags.remove(key, &old_tags);
            self.tags.insert(key, &new_tags);
        }
        self.notifier.publish(key);
        self.write_through(key);
        true
    }

    // == Delete ==
    /// Removes an entry and every index reference to it.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.remove_entry(key).is_none() {
            return false;
        }
        self.backend_remove(key);
        self.notifier.publish(key);
        self.stats.set_total_entries(self.entries.len());
        true
    }

    // == Invalidate ==
    /// Force-expires an entry in place without discarding it.
    pub fn invalidate(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.peek_mut(key) else {
            return false;
        };
        entry.expires_at = 0;

        self.stats.record_invalidation();
        self.notifier.publish(key);
        self.write_through(key);
        true
    }

    /// Force-expires every entry carrying `tag`.
    pub fn invalidate_by_tag(&mut self, tag: &str) -> usize {
        self.invalidate_by_tags(&[tag])
    }

    /// Force-expires every entry carrying any of `tags`.
    pub fn invalidate_by_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> usize {
        let keys = self.get_keys_by_tags(tags);
        let count = keys.iter().filter(|key| self.invalidate(key)).count();
        if count > 0 {
            info!("Invalidated {} entries by tag", count);
        }
        count
    }

    /// Deletes every entry carrying any of `tags`.
    pub fn purge_by_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> usize {
        let keys = self.get_keys_by_tags(tags);
        keys.iter().filter(|key| self.delete(key)).count()
    }

    // == Tag Lookup ==
    /// Union of keys indexed under any of `tags`.
    ///
    /// References to keys no longer in the store are dropped on the way.
    /// Expired entries are still returned.
    pub fn get_keys_by_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> Vec<String> {
        let mut found = BTreeSet::new();
        for tag in normalize_tags(tags) {
            for key in self.tags.lookup(&tag) {
                if self.entries.contains(&key) {
                    found.insert(key);
                } else {
                    debug!("Purging dangling tag reference {} -> {}", tag, key);
                    self.tags.forget(&tag, &key);
                }
            }
        }
        found.into_iter().collect()
    }

    // == Path Lookup ==
    /// Associates an extra originating path with a live key.
    pub fn add_path(&mut self, key: &str, path: &str) -> bool {
        if !self.entries.contains(key) {
            return false;
        }
        self.paths.associate(key, &normalize_path(path));
        true
    }

    /// Keys that originated under `path`.
    pub fn keys_for_path(&mut self, path: &str) -> Vec<String> {
        let path = normalize_path(path);
        let mut live = Vec::new();
        for key in self.paths.keys_for(&path) {
            if self.entries.contains(&key) {
                live.push(key);
            } else {
                debug!("Purging dangling path reference {} -> {}", path, key);
                self.paths.forget(&path, &key);
            }
        }
        live
    }

    /// What the cache believes about every key under `path`.
    pub fn facts_for_path(&mut self, path: &str, now: i64) -> Vec<CacheFact> {
        self.keys_for_path(path)
            .iter()
            .filter_map(|key| self.fact_for(key, now))
            .collect()
    }

    /// What the cache believes about one key, without touching it.
    pub fn fact_for(&self, key: &str, now: i64) -> Option<CacheFact> {
        let entry = self.entries.peek(key)?;
        let tags = entry.all_tags();
        let mut fact = CacheFact::new(key, entry.ttl_remaining_secs(now));
        fact.hash = entry.content_hash.clone();
        if !tags.is_empty() {
            fact.tags = Some(tags);
        }
        Some(fact)
    }

    // == Subscriptions ==
    /// Registers a listener for changes to `key`.
    pub fn subscribe(&mut self, key: &str, listener: Listener<CacheEntry<T>>) -> Subscription {
        self.notifier.subscribe(key, listener)
    }

    /// Removes exactly the listener behind `subscription`.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.notifier.unsubscribe(subscription)
    }

    /// Delivers coalesced changes. Call once the current burst of mutations
    /// is complete.
    pub fn flush_notifications(&mut self) -> usize {
        let entries = &self.entries;
        self.notifier.flush(|key| entries.peek(key))
    }

    pub fn has_pending_notifications(&self) -> bool {
        self.notifier.has_pending()
    }

    // == Capacity ==
    /// Changes capacity. A store already above the new bound shrinks on the
    /// next insertion of a new key.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    // == Hydrate ==
    /// Seeds the store from a startup snapshot. Returns the number written.
    pub fn hydrate<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = (String, EntryFields<T>)>,
    {
        let mut count = 0;
        for (key, fields) in batch {
            self.set(&key, fields.with_origin(Origin::Hydrated));
            count += 1;
        }
        info!("Hydrated {} entries", count);
        count
    }

    // == Cleanup Expired ==
    /// Removes entries that expired more than `grace_ms` ago.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, grace_ms: i64) -> usize {
        self.sweep_expired(grace_ms, None)
    }

    fn sweep_expired(&mut self, grace_ms: i64, spare: Option<&str>) -> usize {
        let now = current_timestamp_ms();
        let expired: Vec<String> = self
            .entries
            .iter_oldest_first()
            .filter(|(key, _)| Some(key.as_str()) != spare)
            .filter(|(_, entry)| now > entry.expires_at.saturating_add(grace_ms))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired.iter().filter(|key| self.delete(key)).count();
        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from least to most recently touched.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys_oldest_first()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Reset ==
    /// Drops all entries, indexes, listeners, pending notifications and
    /// statistics, and clears the backing tier.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.tags.clear();
        self.paths.clear();
        self.notifier.clear();
        self.stats = CacheStats::new();
        if let Some(backend) = &self.backend {
            if let Err(err) = backend.clear() {
                if !err.is_bypass() {
                    warn!("Failed to clear backing storage: {}", err);
                }
            }
        }
    }

    // == Internals ==
    fn insert_entry(&mut self, key: &str, entry: CacheEntry<T>) {
        self.place_entry(key, entry);
        self.notifier.publish(key);
    }

    /// Inserts and indexes without marking the key as changed.
    fn place_entry(&mut self, key: &str, entry: CacheEntry<T>) {
        if let Some(previous) = self.entries.peek(key) {
            let old_tags = previous.all_tags();
            self.tags.remove(key, &old_tags);
        } else {
            self.make_room(key);
        }

        self.tags.insert(key, &entry.all_tags());
        if let Some(path) = origin_path(key) {
            self.paths.associate(key, &path);
        }
        self.entries.insert(key.to_string(), entry);
        self.stats.set_total_entries(self.entries.len());
    }

    /// Evicts least recently touched entries until `incoming` fits.
    fn make_room(&mut self, incoming: &str) {
        while self.entries.len() >= self.max_size {
            let Some(victim) = self.entries.oldest_except(incoming) else {
                break;
            };
            if self.remove_entry(&victim).is_none() {
                break;
            }
            debug!("Evicted least recently used key {}", victim);
            self.backend_remove(&victim);
            self.notifier.publish(&victim);
            self.stats.record_eviction();
        }
    }

    /// Removes an entry from the primary map and both indexes.
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.tags.remove(key, &entry.all_tags());
        self.paths.remove_key(key);
        Some(entry)
    }

    fn restore_from_backend(&mut self, key: &str, now: i64) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        let bytes = match backend.load(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return false,
            Err(err) if err.is_bypass() => return false,
            Err(err) => {
                warn!("Backing storage read failed for {}: {}", key, err);
                return false;
            }
        };

        match serde_json::from_slice::<CacheEntry<T>>(&bytes) {
            Ok(mut entry) => {
                entry.last_accessed = now;
                self.place_entry(key, entry);
                true
            }
            Err(err) => {
                let err = StorageError::Corruption(err.to_string());
                warn!("Purging unreadable stored entry {}: {}", key, err);
                self.backend_remove(key);
                false
            }
        }
    }

    fn write_through(&mut self, key: &str) {
        let Some(result) = self.backend_store(key) else {
            return;
        };
        match result {
            Ok(()) => {}
            Err(err) if err.is_bypass() => {
                debug!("Backing storage bypassed for {}: {}", key, err);
            }
            Err(StorageError::QuotaExceeded(msg)) => {
                warn!("Backing storage full ({}); removing expired entries", msg);
                self.sweep_expired(0, Some(key));
                if let Some(Err(err)) = self.backend_store(key) {
                    warn!("Dropping backing write for {} after retry: {}", key, err);
                    self.stats.record_dropped_write();
                }
            }
            Err(err) => {
                warn!("Dropping backing write for {}: {}", key, err);
                self.stats.record_dropped_write();
            }
        }
    }

    fn backend_store(&self, key: &str) -> Option<Result<(), StorageError>> {
        let backend = self.backend.as_ref()?;
        let entry = self.entries.peek(key)?;
        let result = serde_json::to_vec(entry)
            .map_err(|err| StorageError::OperationFailed(err.to_string()))
            .and_then(|bytes| backend.store(key, &bytes));
        Some(result)
    }

    fn backend_remove(&self, key: &str) {
        if let Some(backend) = &self.backend {
            if let Err(err) = backend.remove(key) {
                if !err.is_bypass() {
                    warn!("Failed to remove {} from backing storage: {}", key, err);
                }
            }
        }
    }
}
