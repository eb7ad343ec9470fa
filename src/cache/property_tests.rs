//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check item, pattern and in-memory backend invariants
//! across generated inputs.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

use crate::cache::{glob_match, Cache, CacheItem, MemoryCache, OpContext};
use crate::duration::{format_duration, parse_duration};

// == Strategies ==
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,48}"
}

/// Arbitrary JSON values a few levels deep.
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,32}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn ttl_strategy() -> impl Strategy<Value = Duration> {
    (1u64..=86_400_000).prop_map(Duration::from_millis)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Encoding then decoding an item preserves every field.
    #[test]
    fn prop_item_encoding_preserves_fields(
        key in key_strategy(),
        value in value_strategy(),
        ttl in ttl_strategy(),
    ) {
        let item = CacheItem::new(key, value, ttl);
        let decoded = CacheItem::from_bytes(&item.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(decoded, item);
    }

    // expires_at - created_at == ttl, and the remaining TTL never exceeds
    // the configured one nor goes negative.
    #[test]
    fn prop_remaining_ttl_bounded(
        ttl in ttl_strategy(),
        offset_ms in 0i64..200_000_000,
    ) {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let item = CacheItem::new_at("k", json!(1), ttl, created);
        prop_assert_eq!((item.expires_at - item.created_at).to_std().unwrap(), ttl);

        let now = created + chrono::Duration::milliseconds(offset_ms);
        let remaining = item.remaining_ttl_at(now);
        prop_assert!(remaining <= ttl);
        prop_assert_eq!(item.is_expired_at(now), now > item.expires_at);
        if item.is_expired_at(now) {
            prop_assert_eq!(remaining, Duration::ZERO);
        }
    }

    // Formatted durations parse back to the same value.
    #[test]
    fn prop_duration_format_parses_back(nanos in 0u64..=1_000_000_000_000_000) {
        let duration = Duration::from_nanos(nanos);
        prop_assert_eq!(parse_duration(&format_duration(duration)).unwrap(), duration);
    }

    // A pattern without metacharacters matches only itself.
    #[test]
    fn prop_literal_pattern_matches_only_itself(
        pattern in "[a-z0-9:_]{1,16}",
        other in "[a-z0-9:_]{1,16}",
    ) {
        prop_assert!(glob_match(&pattern, &pattern));
        prop_assert_eq!(glob_match(&pattern, &other), pattern == other);
    }

    // `prefix*` matches exactly the keys that start with `prefix`.
    #[test]
    fn prop_prefix_pattern(prefix in "[a-z:]{1,8}", key in "[a-z:]{0,16}") {
        let pattern = format!("{}*", prefix);
        prop_assert_eq!(glob_match(&pattern, &key), key.starts_with(&prefix));
    }

    // A stored value reads back unchanged with its own key.
    #[test]
    fn prop_memory_set_get_round_trip(
        key in key_strategy(),
        value in value_strategy(),
        ttl in (60u64..86_400).prop_map(Duration::from_secs),
    ) {
        let cache = MemoryCache::new();
        let ctx = OpContext::background();

        let item = tokio_test::block_on(async {
            cache.set(&ctx, &key, value.clone(), ttl).await.unwrap();
            cache.get(&ctx, &key).await.unwrap()
        });

        let item = item.expect("live item should be returned");
        prop_assert_eq!(&item.key, &key);
        prop_assert_eq!(&item.value, &value);
        prop_assert_eq!(item.ttl, ttl);
    }

    // Batch reads return exactly the requested keys that were written.
    #[test]
    fn prop_get_multiple_is_partial(
        stored in prop::collection::hash_set(key_strategy(), 0..10),
        requested in prop::collection::vec(key_strategy(), 0..15),
    ) {
        let cache = MemoryCache::new();
        let ctx = OpContext::background();

        let found = tokio_test::block_on(async {
            for key in &stored {
                cache.set(&ctx, key, json!(key), Duration::from_secs(3600)).await.unwrap();
            }
            cache.get_multiple(&ctx, &requested).await.unwrap()
        });

        let expected: HashSet<&String> = requested.iter().filter(|k| stored.contains(*k)).collect();
        let actual: HashSet<&String> = found.keys().collect();
        prop_assert_eq!(actual, expected);
        for (key, item) in &found {
            prop_assert_eq!(&item.value, &json!(key));
        }
    }

    // After deleting a subset, size counts only what is left.
    #[test]
    fn prop_delete_multiple_shrinks_size(
        stored in prop::collection::hash_set(key_strategy(), 1..12),
        delete_count in 0usize..12,
    ) {
        let cache = MemoryCache::new();
        let ctx = OpContext::background();
        let keys: Vec<String> = stored.into_iter().collect();
        let doomed: Vec<String> = keys.iter().take(delete_count).cloned().collect();

        let size = tokio_test::block_on(async {
            for key in &keys {
                cache.set(&ctx, key, json!(1), Duration::from_secs(3600)).await.unwrap();
            }
            cache.delete_multiple(&ctx, &doomed).await.unwrap();
            cache.size(&ctx).await.unwrap()
        });

        prop_assert_eq!(size as usize, keys.len() - doomed.len());
    }
}
