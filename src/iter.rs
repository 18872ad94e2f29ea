use crate::shard::Shard;
use std::sync::Arc;

/// Snapshot-based iterator over a store's entries.
///
/// Collects every entry into a vector first (in key order within each
/// shard), then iterates over the captured state. Concurrent modifications
/// made after the snapshot was taken are not visible, which makes the view
/// consistent.
pub struct SnapshotIter<K, V> {
    entries: Vec<(K, Arc<V>)>,
    index: usize,
}

impl<K, V> SnapshotIter<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Send + Sync,
{
    pub(crate) fn new(shards: &[Shard<K, V>]) -> Self {
        let mut entries = Vec::new();

        for shard in shards {
            let tree = shard.tree_read();
            for (key, value) in tree.iter() {
                entries.push((key.clone(), value.clone()));
            }
        }

        Self { entries, index: 0 }
    }
}

impl<K, V> Iterator for SnapshotIter<K, V>
where
    K: Clone,
{
    type Item = (K, Arc<V>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.entries.len() {
            let item = self.entries[self.index].clone();
            self.index += 1;
            Some(item)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<K, V> ExactSizeIterator for SnapshotIter<K, V> where K: Clone {}
