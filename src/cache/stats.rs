//! Cache Statistics Module
//!
//! Counters describing how the store is serving reads and how often it had
//! to degrade: evictions, forced expiry, stale reads and lost backend writes.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups that found an entry (fresh or stale)
    pub hits: u64,
    /// Subset of `hits` that returned an expired entry
    pub stale_hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries pulled back from the backing tier after a memory miss
    pub backend_restores: u64,
    pub evictions: u64,
    /// Entries force-expired in place
    pub invalidations: u64,
    /// Backend writes abandoned after a failed retry
    pub dropped_writes: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// hits / (hits + misses), or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }

    /// Share of lookups answered with a fresh entry.
    pub fn fresh_hit_rate(&self) -> f64 {
        ratio(self.hits - self.stale_hits, self.hits + self.misses)
    }

    /// Records a successful lookup; `stale` when the entry had expired.
    pub fn record_hit(&mut self, stale: bool) {
        self.hits += 1;
        if stale {
            self.stale_hits += 1;
        }
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_restore(&mut self) {
        self.backend_restores += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }

    pub fn record_dropped_write(&mut self) {
        self.dropped_writes += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_before_any_lookup() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.fresh_hit_rate(), 0.0);
    }

    #[test]
    fn test_stale_hits_count_as_hits_but_not_fresh() {
        let mut stats = CacheStats::new();
        stats.record_hit(false);
        stats.record_hit(false);
        stats.record_hit(true);
        stats.record_miss();

        assert_eq!(stats.hits, 3);
        assert_eq!(stats.stale_hits, 1);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.fresh_hit_rate(), 0.5);
    }

    #[test]
    fn test_degradation_counters() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_invalidation();
        stats.record_dropped_write();
        stats.record_restore();
        stats.set_total_entries(42);

        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.invalidations, 1);
        assert_eq!(stats.dropped_writes, 1);
        assert_eq!(stats.backend_restores, 1);
        assert_eq!(stats.total_entries, 42);
    }
}
