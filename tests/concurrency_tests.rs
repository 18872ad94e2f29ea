//! Core store behavior under threads: parallel mutation, read visibility,
//! and rebalancing racing live traffic.

use shardtree::{RoutingStrategy, ShardTree, ShardTreeBuilder};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_puts() {
    let store = Arc::new(ShardTree::new());
    let mut handles = vec![];

    for thread_id in 0..10u64 {
        let store = Arc::clone(&store);
        let handle = thread::spawn(move || {
            for i in 0..100u64 {
                store.put(thread_id * 1_000 + i, i);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 1_000);
    store.check_invariants().unwrap();
}

#[test]
fn test_concurrent_gets() {
    let store = Arc::new(ShardTree::new());
    for i in 0..100u64 {
        store.put(i, i);
    }

    let mut handles = vec![];
    for _ in 0..20 {
        let store = Arc::clone(&store);
        let handle = thread::spawn(move || {
            for i in 0..100u64 {
                assert_eq!(*store.get(&i).unwrap(), i);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_put_visible_to_other_threads() {
    // Writer inserts a batch, then readers spawned afterwards must see
    // every entry: a put that returned is visible to any thread that
    // synchronizes with it.
    let store = Arc::new(
        ShardTreeBuilder::new()
            .shard_count(8)
            .unwrap()
            .strategy(RoutingStrategy::Intelligent)
            .hotspot_floor(10)
            .build::<u64, u64>(),
    );

    let keys: Vec<u64> = (0..)
        .filter(|k| store.natural_shard_for_key(k) == 2)
        .take(200)
        .collect();
    for &key in &keys {
        store.put(key, key + 5);
    }

    let keys = Arc::new(keys);
    let mut handles = vec![];
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let keys = Arc::clone(&keys);
        handles.push(thread::spawn(move || {
            for &key in keys.iter() {
                assert!(store.contains(&key));
                assert_eq!(*store.get(&key).unwrap(), key + 5);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_removes() {
    let store = Arc::new(ShardTree::new());
    for i in 0..2_000u64 {
        store.put(i, i);
    }

    let mut handles = vec![];
    for t in 0..4u64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in (t * 500)..((t + 1) * 500) {
                assert!(store.remove(&i));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(store.is_empty());
    assert_eq!(store.redirect_stats().entries, 0);
    store.check_invariants().unwrap();
}

#[test]
fn test_rebalance_races_live_traffic() {
    let store = Arc::new(
        ShardTreeBuilder::new()
            .shard_count(8)
            .unwrap()
            .strategy(RoutingStrategy::Hash)
            .build::<u64, u64>(),
    );

    let mut handles = vec![];
    for t in 0..4u64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..2_000u64 {
                let key = t * 10_000 + i;
                store.put(key, key);
                if i % 64 == 0 {
                    assert_eq!(*store.get(&key).unwrap(), key);
                }
            }
        }));
    }
    // Interleave maintenance with the writers.
    for _ in 0..5 {
        store.rebalance(1.5);
        store.gc_redirects();
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 8_000);
    for t in 0..4u64 {
        for i in 0..2_000u64 {
            let key = t * 10_000 + i;
            assert_eq!(*store.get(&key).unwrap(), key);
        }
    }
    store.check_invariants().unwrap();
}

#[test]
fn test_concurrent_insert_then_introspect() {
    let store = Arc::new(ShardTree::new());
    let mut handles = vec![];

    for t in 0..4u64 {
        let store = Arc::clone(&store);
        let handle = thread::spawn(move || {
            for i in 0..500u64 {
                store.put(t * 10_000 + i, i);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let loads = store.shard_loads();
    assert_eq!(loads.len(), 8);
    assert_eq!(loads.iter().sum::<usize>(), 2_000);

    let diag = store.diagnostics();
    assert_eq!(diag.total_entries, 2_000);
    assert!(diag.max_load_ratio >= 1.0);
    assert_eq!(diag.strategy, "intelligent");
}
