//! Tests for the instance cache
//!
//! These tests verify:
//! - Hit/miss accounting
//! - Capacity bound with least-recently-used eviction
//! - Prefix invalidation
//! - Concurrent access

use std::sync::Arc;
use std::thread;

use serde_json::json;
use sydb::cache::InstanceCache;

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_put_then_get() {
    let cache = InstanceCache::new(4);
    let key = InstanceCache::key("shop", "items", "a");

    cache.put(key.clone(), json!({ "title": "Widget" }));

    assert_eq!(cache.get(&key), Some(json!({ "title": "Widget" })));
    assert_eq!(key, "shop/items/a");
}

#[test]
fn test_miss_and_hit_counters() {
    let cache = InstanceCache::new(4);
    cache.put("k".to_string(), json!(1));

    assert!(cache.get("missing").is_none());
    assert!(cache.get("k").is_some());
    assert!(cache.get("k").is_some());

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(cache.access_count("k"), Some(2));
}

#[test]
fn test_overwrite_does_not_count_eviction() {
    let cache = InstanceCache::new(2);
    cache.put("k".to_string(), json!(1));
    cache.put("k".to_string(), json!(2));

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("k"), Some(json!(2)));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_remove() {
    let cache = InstanceCache::new(2);
    cache.put("k".to_string(), json!(1));

    assert_eq!(cache.remove("k"), Some(json!(1)));
    assert!(!cache.contains("k"));
    assert!(cache.is_empty());
}

#[test]
fn test_zero_capacity_is_raised_to_one() {
    let cache = InstanceCache::new(0);

    cache.put("a".to_string(), json!(1));

    assert_eq!(cache.capacity(), 1);
    assert_eq!(cache.len(), 1);
}

// =============================================================================
// Eviction Tests
// =============================================================================

#[test]
fn test_capacity_plus_one_evicts_oldest() {
    let capacity = 3;
    let cache = InstanceCache::new(capacity);

    for i in 0..=capacity {
        cache.put(format!("k{}", i), json!(i));
    }

    assert_eq!(cache.len(), capacity);
    assert!(!cache.contains("k0"));
    assert!(cache.contains("k3"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_get_refreshes_recency() {
    let cache = InstanceCache::new(2);
    cache.put("a".to_string(), json!(1));
    cache.put("b".to_string(), json!(2));

    cache.get("a");
    cache.put("c".to_string(), json!(3));

    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
}

// =============================================================================
// Invalidation Tests
// =============================================================================

#[test]
fn test_invalidate_prefix() {
    let cache = InstanceCache::new(8);
    cache.put(InstanceCache::key("shop", "items", "1"), json!(1));
    cache.put(InstanceCache::key("shop", "items", "2"), json!(2));
    cache.put(InstanceCache::key("shop", "orders", "1"), json!(3));
    cache.put(InstanceCache::key("shopping", "items", "1"), json!(4));

    let removed = cache.invalidate_prefix("shop/items/");

    assert_eq!(removed, 2);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.invalidate_prefix("shop/"), 1);
    assert!(cache.contains(&InstanceCache::key("shopping", "items", "1")));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_puts_respect_capacity() {
    let cache = Arc::new(InstanceCache::new(16));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{}-{}", t, i);
                    cache.put(key.clone(), json!(i));
                    cache.get(&key);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 16);
    assert_eq!(cache.stats().evictions, 400 - 16);
}
