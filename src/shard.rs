use crate::stats::ShardStats;
use crate::tree::AvlTree;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A single shard: an AVL tree behind a read-write lock, plus an atomically
/// readable mirror of the tree's length.
///
/// The length mirror is written inside the exclusive section of every
/// mutation, so `len()` never disagrees with the tree for longer than the
/// writer holds the lock.
pub(crate) struct Shard<K, V> {
    tree: RwLock<AvlTree<K, Arc<V>>>,
    len: AtomicUsize,
    stats: ShardStats,
}

impl<K, V> Shard<K, V>
where
    K: Ord + Send + Sync,
    V: Send + Sync,
{
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(AvlTree::new()),
            len: AtomicUsize::new(0),
            stats: ShardStats::new(),
        }
    }

    /// Exclusive access to the tree. The caller must call `sync_len` before
    /// dropping the guard if it mutated the tree.
    pub fn tree_write(&self) -> RwLockWriteGuard<'_, AvlTree<K, Arc<V>>> {
        self.tree.write()
    }

    /// Shared access to the tree, for iteration and snapshots.
    pub fn tree_read(&self) -> RwLockReadGuard<'_, AvlTree<K, Arc<V>>> {
        self.tree.read()
    }

    /// Refresh the length mirror from a write guard's tree.
    pub fn sync_len(&self, tree: &AvlTree<K, Arc<V>>) {
        self.len.store(tree.len(), Ordering::Release);
    }

    /// Insert a key-value pair. Returns `true` if a new entry was created.
    pub fn insert(&self, key: K, value: Arc<V>) -> bool {
        let mut tree = self.tree.write();
        let fresh = tree.insert(key, value);
        self.sync_len(&tree);
        if fresh {
            self.stats.record_write();
        }
        fresh
    }

    /// Remove a key, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut tree = self.tree.write();
        let removed = tree.remove(key).is_some();
        self.sync_len(&tree);
        if removed {
            self.stats.record_remove();
        }
        removed
    }

    /// Look up a key, cloning the `Arc` on a hit.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let tree = self.tree.read();
        let result = tree.get(key).cloned();
        if result.is_some() {
            self.stats.record_read();
        }
        result
    }

    /// Whether the key is present.
    pub fn contains(&self, key: &K) -> bool {
        self.tree.read().contains(key)
    }

    /// Number of entries, without taking the lock.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether this shard has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest key in this shard, if any.
    pub fn min_key(&self) -> Option<K>
    where
        K: Clone,
    {
        self.tree.read().min_key().cloned()
    }

    /// Largest key in this shard, if any.
    pub fn max_key(&self) -> Option<K>
    where
        K: Clone,
    {
        self.tree.read().max_key().cloned()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut tree = self.tree.write();
        tree.clear();
        self.sync_len(&tree);
    }

    /// Record a write performed through a `tree_write` guard.
    pub fn record_write(&self) {
        self.stats.record_write();
    }

    /// Operation counters snapshot.
    pub fn stats(&self) -> crate::stats::ShardOps {
        self.stats.snapshot()
    }
}

impl<K, V> Default for Shard<K, V>
where
    K: Ord + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
