//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store's invariants over random operation
//! sequences.

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::cache::{current_timestamp_ms, is_expired, CacheEntry, CacheStore, EntryFields};
use crate::sync::{content_hash, decode, encode, CacheFact};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_DEFAULT_TTL: i64 = 300;

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,32}"
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}"
}

fn tag_set_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("t[0-4]", 0..3)
}

/// Keys that are unique within one generated vector
fn unique_keys_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(valid_key_strategy(), min..max)
        .prop_map(|set| set.into_iter().collect())
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String, tags: Vec<String> },
    Get { key: String },
    Delete { key: String },
}

fn small_key_strategy() -> impl Strategy<Value = String> {
    "k[0-9]{1,2}"
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (small_key_strategy(), valid_value_strategy(), tag_set_strategy())
            .prop_map(|(key, value, tags)| CacheOp::Set { key, value, tags }),
        small_key_strategy().prop_map(|key| CacheOp::Get { key }),
        small_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn fields(value: &str, tags: &[String]) -> EntryFields<String> {
    EntryFields::new(value.to_string(), TEST_DEFAULT_TTL).with_tags(tags.iter().cloned())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES, TEST_DEFAULT_TTL);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value, tags } => store.set(&key, fields(&value, &tags)),
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, store.len(), "Total entries mismatch");
    }

    #[test]
    fn prop_last_write_wins(
        key in valid_key_strategy(),
        values in prop::collection::vec(valid_value_strategy(), 1..6)
    ) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES, TEST_DEFAULT_TTL);

        for value in &values {
            store.set(&key, fields(value, &[]));
        }

        let last = values.last().cloned();
        prop_assert_eq!(store.get(&key).map(|e| e.data.clone()), last);
        prop_assert_eq!(store.len(), 1, "Should have exactly one entry after overwrites");
    }

    #[test]
    fn prop_delete_removes_entry(key in valid_key_strategy(), value in valid_value_strategy()) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES, TEST_DEFAULT_TTL);

        store.set(&key, fields(&value, &["t0".to_string()]));
        prop_assert!(store.delete(&key));

        prop_assert!(store.get(&key).is_none(), "Key should not exist after delete");
        prop_assert!(store.get_keys_by_tags(&["t0"]).is_empty());
    }

    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), valid_value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let mut store = CacheStore::new(max_entries, TEST_DEFAULT_TTL);

        for (key, value) in entries {
            store.set(&key, fields(&value, &[]));
            prop_assert!(
                store.len() <= max_entries,
                "Cache size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }

    /// Inserting N + k distinct keys into a store of size N evicts exactly
    /// the k earliest.
    #[test]
    fn prop_lru_eviction_order(keys in unique_keys_strategy(4, 20), capacity in 2usize..4) {
        let mut store = CacheStore::new(capacity, TEST_DEFAULT_TTL);

        for key in &keys {
            store.set(key, fields("v", &[]));
        }

        let overflow = keys.len() - capacity;
        for key in &keys[..overflow] {
            prop_assert!(!store.contains(key), "Key '{}' should have been evicted", key);
        }
        for key in &keys[overflow..] {
            prop_assert!(store.contains(key), "Key '{}' should survive", key);
        }
        prop_assert_eq!(store.stats().evictions, overflow as u64);
    }

    #[test]
    fn prop_lru_access_tracking(keys in unique_keys_strategy(3, 8), new_key in "new_[a-z]{1,8}") {
        let capacity = keys.len();
        let mut store = CacheStore::new(capacity, TEST_DEFAULT_TTL);

        for key in &keys {
            store.set(key, fields("v", &[]));
        }

        // Touch the oldest so the second-oldest becomes the victim
        prop_assert!(store.get(&keys[0]).is_some());
        store.set(&new_key, fields("v", &[]));

        prop_assert!(store.contains(&keys[0]), "Touched key must not be evicted");
        prop_assert!(!store.contains(&keys[1]), "Second-oldest key should be evicted");
        prop_assert!(store.contains(&new_key));
    }

    /// After any mix of writes, deletes and evictions, a tag lookup returns
    /// exactly the live keys carrying that tag.
    #[test]
    fn prop_tag_index_exact(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut store = CacheStore::new(8, TEST_DEFAULT_TTL);

        for op in ops {
            match op {
                CacheOp::Set { key, value, tags } => store.set(&key, fields(&value, &tags)),
                CacheOp::Get { key } => {
                    store.get(&key);
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
        }

        let mut expected: HashMap<String, HashSet<String>> = HashMap::new();
        for key in store.keys() {
            let entry = store.peek(&key).cloned();
            prop_assert!(entry.is_some());
            for tag in entry.map(|e| e.tags).unwrap_or_default() {
                expected.entry(tag).or_default().insert(key.clone());
            }
        }

        for tag in ["t0", "t1", "t2", "t3", "t4"] {
            let found: HashSet<String> = store.get_keys_by_tags(&[tag]).into_iter().collect();
            prop_assert_eq!(found, expected.remove(tag).unwrap_or_default(), "tag {}", tag);
        }
    }

    #[test]
    fn prop_expiry_rule(expires_at in -1_000i64..1_000, now in -1_000i64..1_000) {
        let mut entry = CacheEntry::from_fields(EntryFields::new(0u8, 1), 0);
        entry.expires_at = expires_at;
        prop_assert_eq!(is_expired(&entry, now), now > expires_at);
    }

    #[test]
    fn prop_hash_ignores_field_order(
        fields in prop::collection::hash_map("[a-z]{1,6}", any::<i32>(), 0..8)
    ) {
        let mut forward = Map::new();
        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort();
        for (k, v) in &sorted {
            forward.insert((*k).clone(), Value::from(**v));
        }
        let mut backward = Map::new();
        for (k, v) in sorted.iter().rev() {
            backward.insert((*k).clone(), Value::from(**v));
        }

        let a = content_hash(&Value::Object(forward)).unwrap();
        let b = content_hash(&Value::Object(backward)).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_codec_round_trip(
        facts in prop::collection::vec(
            ("[a-zA-Z:/|,]{1,40}", -10i64..10_000, prop::option::of("[a-f0-9]{16}")),
            0..20
        )
    ) {
        let facts: Vec<CacheFact> = facts
            .into_iter()
            .map(|(key, ttl, hash)| {
                let fact = CacheFact::new(key, ttl);
                match hash {
                    Some(h) => fact.with_hash(format!("W/\"{}\"", h)),
                    None => fact,
                }
            })
            .collect();

        prop_assert_eq!(decode(&encode(&facts)), facts);
    }
}

// TTL checks use explicit timestamps rather than sleeping
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_stale_entries_stay_readable(key in valid_key_strategy(), value in valid_value_strategy()) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES, TEST_DEFAULT_TTL);

        store.set(&key, EntryFields::new(value.clone(), 0));

        let now = current_timestamp_ms();
        let read = store.get_stale(&key);
        prop_assert!(read.is_some());
        let read = read.unwrap();
        prop_assert!(read.stale);
        prop_assert!(read.entry.is_expired_at(now));
        prop_assert_eq!(&read.entry.data, &value);
        prop_assert!(store.get_fresh(&key).is_none());
    }
}

// == Property Test for Error Response Format ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_error_response_format(error_msg in "[a-zA-Z0-9 _-]{1,100}") {
        use crate::error::CacheError;
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            CacheError::NotFound(error_msg.clone()),
            CacheError::InvalidRequest(error_msg.clone()),
            CacheError::Hashing(error_msg.clone()),
            CacheError::Internal(error_msg.clone()),
        ];

        let rt = tokio::runtime::Runtime::new().unwrap();
        for error in error_variants {
            let response = error.into_response();

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = rt.block_on(async { to_bytes(response.into_body(), usize::MAX).await.unwrap() });
            let json: Value = serde_json::from_slice(&bytes).expect("Response body should be valid JSON");

            prop_assert_eq!(json["error"].as_str(), Some(error_msg.as_str()));
        }
    }
}
