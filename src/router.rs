use crate::config::RoutingStrategy;
use crate::hash::KeyRoute;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Maps keys to shards and tracks per-shard load to detect hotspots.
///
/// The strategy is fixed at construction. The load counters mirror shard
/// element counts but are maintained by the store calling
/// [`record_insertion`](AdaptiveRouter::record_insertion) /
/// [`record_removal`](AdaptiveRouter::record_removal) on successful
/// mutations, so routing decisions never need a shard lock.
///
/// `route` is hotspot-aware; `natural` answers the same question with
/// diversion disabled and depends only on the key and the strategy. The
/// redirect index relies on `natural` to recognize stale entries.
pub(crate) struct AdaptiveRouter {
    strategy: RoutingStrategy,
    shards: usize,
    loads: Vec<AtomicU64>,
    hotspot_ratio: f64,
    hotspot_floor: u64,
    /// Virtual-node ring, sorted by (token, shard) so equal tokens break
    /// ties toward the lowest shard id. Built once, read-only afterwards.
    /// Empty unless the strategy uses it.
    ring: Vec<(u64, usize)>,
}

impl AdaptiveRouter {
    pub fn new(
        shards: usize,
        strategy: RoutingStrategy,
        hotspot_ratio: f64,
        hotspot_floor: u64,
        virtual_nodes: usize,
    ) -> Self {
        debug_assert!(shards >= 1);
        let ring = match strategy {
            RoutingStrategy::VirtualNodes | RoutingStrategy::Intelligent => {
                Self::build_ring(shards, virtual_nodes)
            }
            _ => Vec::new(),
        };
        Self {
            strategy,
            shards,
            loads: (0..shards).map(|_| AtomicU64::new(0)).collect(),
            hotspot_ratio,
            hotspot_floor,
            ring,
        }
    }

    fn build_ring(shards: usize, virtual_nodes: usize) -> Vec<(u64, usize)> {
        let mut ring = Vec::with_capacity(shards * virtual_nodes);
        for shard in 0..shards {
            for replica in 0..virtual_nodes {
                let mut hasher = ahash::AHasher::default();
                format!("shard-{shard}-{replica}").hash(&mut hasher);
                ring.push((hasher.finish(), shard));
            }
        }
        ring.sort_unstable();
        ring
    }

    /// Pick a shard for the key, diverting away from hotspots when the
    /// strategy supports it.
    pub fn route(&self, key: KeyRoute) -> usize {
        match self.strategy {
            RoutingStrategy::Range => (key.index % self.shards as u64) as usize,
            RoutingStrategy::Hash => (key.hash % self.shards as u64) as usize,
            RoutingStrategy::LoadAware => {
                let natural = (key.hash % self.shards as u64) as usize;
                self.divert_sequential(natural)
            }
            RoutingStrategy::VirtualNodes => {
                let pos = self.ring_position(key.hash);
                self.ring[pos].1
            }
            RoutingStrategy::Intelligent => {
                let pos = self.ring_position(key.hash);
                self.divert_along_ring(pos)
            }
        }
    }

    /// The shard this key maps to with hotspot diversion disabled. A pure
    /// function of the key and the strategy.
    pub fn natural(&self, key: KeyRoute) -> usize {
        match self.strategy {
            RoutingStrategy::Range => (key.index % self.shards as u64) as usize,
            RoutingStrategy::Hash | RoutingStrategy::LoadAware => {
                (key.hash % self.shards as u64) as usize
            }
            RoutingStrategy::VirtualNodes | RoutingStrategy::Intelligent => {
                let pos = self.ring_position(key.hash);
                self.ring[pos].1
            }
        }
    }

    /// First ring slot whose token is >= hash, wrapping around.
    fn ring_position(&self, hash: u64) -> usize {
        debug_assert!(!self.ring.is_empty());
        let pos = self.ring.partition_point(|(token, _)| *token < hash);
        if pos == self.ring.len() {
            0
        } else {
            pos
        }
    }

    /// Probe shards `h+1, h+2, ...` (wrapping) for the first non-hotspot.
    /// Falls back to the natural shard when every shard is hot.
    fn divert_sequential(&self, natural: usize) -> usize {
        let loads = self.load_snapshot();
        let mean = self.mean(&loads);
        if !self.is_hot(loads[natural], mean) {
            return natural;
        }
        for step in 1..self.shards {
            let candidate = (natural + step) % self.shards;
            if !self.is_hot(loads[candidate], mean) {
                return candidate;
            }
        }
        natural
    }

    /// Walk subsequent ring tokens until one lands on a non-hotspot shard.
    /// Falls back to the ring's own choice when every shard is hot.
    fn divert_along_ring(&self, pos: usize) -> usize {
        let loads = self.load_snapshot();
        let mean = self.mean(&loads);
        let chosen = self.ring[pos].1;
        if !self.is_hot(loads[chosen], mean) {
            return chosen;
        }
        for step in 1..self.ring.len() {
            let candidate = self.ring[(pos + step) % self.ring.len()].1;
            if !self.is_hot(loads[candidate], mean) {
                return candidate;
            }
        }
        chosen
    }

    #[inline]
    fn is_hot(&self, load: u64, mean: f64) -> bool {
        load > self.hotspot_floor && load as f64 > self.hotspot_ratio * mean
    }

    fn mean(&self, loads: &[u64]) -> f64 {
        let total: u64 = loads.iter().sum();
        total as f64 / self.shards as f64
    }

    fn load_snapshot(&self) -> Vec<u64> {
        self.loads.iter().map(|l| l.load(Ordering::Relaxed)).collect()
    }

    /// Record a successful insert into the given shard.
    pub fn record_insertion(&self, shard: usize) {
        self.loads[shard].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful removal from the given shard. Saturates at zero.
    pub fn record_removal(&self, shard: usize) {
        let _ = self.loads[shard].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |l| {
            Some(l.saturating_sub(1))
        });
    }

    /// Overwrite every load counter with the actual shard counts. Called
    /// under the rebalance barrier, after migration.
    pub fn reconcile(&self, counts: &[u64]) {
        debug_assert_eq!(counts.len(), self.shards);
        for (load, &count) in self.loads.iter().zip(counts) {
            load.store(count, Ordering::Relaxed);
        }
    }

    /// `1 - (max - min) / max(max, 1)`, clamped to [0, 1].
    pub fn balance_score(&self) -> f64 {
        let loads = self.load_snapshot();
        let max = loads.iter().copied().max().unwrap_or(0);
        let min = loads.iter().copied().min().unwrap_or(0);
        let score = 1.0 - (max - min) as f64 / max.max(1) as f64;
        score.clamp(0.0, 1.0)
    }

    /// Whether any shard currently qualifies as a hotspot.
    pub fn has_hotspot(&self) -> bool {
        self.hotspot_flags().into_iter().any(|h| h)
    }

    /// Per-shard hotspot flags.
    pub fn hotspot_flags(&self) -> Vec<bool> {
        let loads = self.load_snapshot();
        let mean = self.mean(&loads);
        loads.iter().map(|&l| self.is_hot(l, mean)).collect()
    }

    /// Current load counters.
    pub fn loads(&self) -> Vec<u64> {
        self.load_snapshot()
    }

    pub fn strategy_name(&self) -> &'static str {
        match self.strategy {
            RoutingStrategy::Range => "range",
            RoutingStrategy::Hash => "static-hash",
            RoutingStrategy::LoadAware => "load-aware",
            RoutingStrategy::VirtualNodes => "virtual-nodes",
            RoutingStrategy::Intelligent => "intelligent",
        }
    }
}
