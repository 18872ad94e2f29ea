//! Routing-strategy behavior: adversarial stride workloads, hotspot
//! diversion, and redirect consistency.

use shardtree::{RoutingStrategy, ShardTree, ShardTreeBuilder};

fn stride_workload(store: &ShardTree<u64, u64>) {
    for i in 0..500u64 {
        store.put(i * 8, i * 16);
    }
}

// Negative control: range routing sends a stride-8 workload entirely to
// shard 0 on an 8-shard store.
#[test]
fn test_range_routing_is_vulnerable_to_strides() {
    let store = ShardTreeBuilder::new()
        .shard_count(8)
        .unwrap()
        .strategy(RoutingStrategy::Range)
        .build::<u64, u64>();

    stride_workload(&store);

    let loads = store.shard_loads();
    assert_eq!(loads[0], 500, "every stride-8 key lands on shard 0");
    assert!(loads[1..].iter().all(|&l| l == 0));
    assert_eq!(store.balance_score(), 0.0);
    assert!(store.should_rebalance(0.7));
}

// The same workload under intelligent routing spreads across shards and
// stays fully readable.
#[test]
fn test_intelligent_routing_defeats_stride_attack() {
    let store = ShardTreeBuilder::new()
        .shard_count(8)
        .unwrap()
        .strategy(RoutingStrategy::Intelligent)
        .build::<u64, u64>();

    stride_workload(&store);

    let loads = store.shard_loads();
    assert_eq!(loads.iter().sum::<usize>(), 500);
    let max = *loads.iter().max().unwrap();
    let mean = 500.0 / 8.0;
    assert!(
        (max as f64) <= 2.0 * mean,
        "max shard load {} exceeds twice the mean {}",
        max,
        mean
    );
    assert!(store.balance_score() > 0.0);

    for i in 0..500u64 {
        assert_eq!(*store.get(&(i * 8)).unwrap(), i * 16);
    }
    store.check_invariants().unwrap();
}

#[test]
fn test_range_preserves_locality() {
    let store = ShardTreeBuilder::new()
        .shard_count(4)
        .unwrap()
        .strategy(RoutingStrategy::Range)
        .build::<u64, u64>();

    // Keys congruent mod 4 share a shard.
    for i in 0..100u64 {
        store.put(i, i);
    }
    for i in 0..100u64 {
        assert_eq!(store.natural_shard_for_key(&i), (i % 4) as usize);
    }
}

// 200 keys that all naturally hash to one shard: diversion keeps the shard
// from absorbing everything, and the redirect index keeps every key
// reachable.
#[test]
fn test_hotspot_diversion_keeps_keys_reachable() {
    let store = ShardTreeBuilder::new()
        .shard_count(8)
        .unwrap()
        .strategy(RoutingStrategy::Intelligent)
        .hotspot_floor(10)
        .build::<u64, u64>();

    let target = 3;
    let keys: Vec<u64> = (0..)
        .filter(|k| store.natural_shard_for_key(k) == target)
        .take(200)
        .collect();

    for &key in &keys {
        store.put(key, key + 1);
    }

    assert_eq!(store.len(), 200);
    for &key in &keys {
        assert!(store.contains(&key), "key {} unreachable", key);
        assert_eq!(*store.get(&key).unwrap(), key + 1);
    }

    // The natural shard did not absorb the whole workload, so some keys
    // were diverted and recorded.
    let loads = store.shard_loads();
    assert!(loads[target] < 200, "no diversion happened");
    let redirect = store.redirect_stats();
    assert!(redirect.entries > 0);
    assert_eq!(store.diagnostics().redirected_keys, redirect.entries);

    store.check_invariants().unwrap();
}

#[test]
fn test_load_aware_diversion() {
    let store = ShardTreeBuilder::new()
        .shard_count(4)
        .unwrap()
        .strategy(RoutingStrategy::LoadAware)
        .hotspot_floor(10)
        .build::<u64, u64>();

    let target = 1;
    let keys: Vec<u64> = (0..)
        .filter(|k| store.natural_shard_for_key(k) == target)
        .take(100)
        .collect();

    for &key in &keys {
        store.put(key, key);
    }

    assert!(store.shard_loads()[target] < 100);
    for &key in &keys {
        assert_eq!(*store.get(&key).unwrap(), key);
    }
    store.check_invariants().unwrap();
}

#[test]
fn test_virtual_nodes_spread_uniform_keys() {
    let store = ShardTreeBuilder::new()
        .shard_count(8)
        .unwrap()
        .strategy(RoutingStrategy::VirtualNodes)
        .build::<u64, u64>();

    for i in 0..2_000u64 {
        store.put(i, i);
    }

    let loads = store.shard_loads();
    assert_eq!(loads.iter().sum::<usize>(), 2_000);
    assert!(loads.iter().all(|&l| l > 0), "a shard received nothing");
    // No diversion under pure virtual nodes: natural always equals routed.
    for i in 0..100u64 {
        assert_eq!(store.natural_shard_for_key(&i), store.shard_for_key(&i));
    }
    assert_eq!(store.redirect_stats().entries, 0);
}

#[test]
fn test_removing_diverted_keys_drops_redirects() {
    let store = ShardTreeBuilder::new()
        .shard_count(8)
        .unwrap()
        .strategy(RoutingStrategy::Intelligent)
        .hotspot_floor(10)
        .build::<u64, u64>();

    let keys: Vec<u64> = (0..)
        .filter(|k| store.natural_shard_for_key(k) == 0)
        .take(150)
        .collect();
    for &key in &keys {
        store.put(key, key);
    }
    assert!(store.redirect_stats().entries > 0);

    for &key in &keys {
        assert!(store.remove(&key));
    }
    assert_eq!(store.redirect_stats().entries, 0);
    assert!(store.is_empty());
    store.check_invariants().unwrap();
}

#[test]
fn test_update_of_diverted_key_does_not_duplicate() {
    let store = ShardTreeBuilder::new()
        .shard_count(8)
        .unwrap()
        .strategy(RoutingStrategy::Intelligent)
        .hotspot_floor(10)
        .build::<u64, u64>();

    let keys: Vec<u64> = (0..)
        .filter(|k| store.natural_shard_for_key(k) == 5)
        .take(150)
        .collect();
    for &key in &keys {
        store.put(key, 0);
    }

    // Overwrite every key; sizes must not move, values must update, and no
    // key may exist in two shards at once (check_invariants verifies
    // redirect residency).
    for &key in &keys {
        store.put(key, key * 7);
    }
    assert_eq!(store.len(), 150);
    for &key in &keys {
        assert_eq!(*store.get(&key).unwrap(), key * 7);
    }
    store.check_invariants().unwrap();
}
