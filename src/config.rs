use crate::error::Error;
use crate::hash::KeyHasher;

/// Which hash function to use for key routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// Use ahash (default, fast and well-distributed).
    #[default]
    AHash,
    /// Use fxhash (faster but potentially less distributed).
    #[cfg(feature = "fxhash")]
    FxHash,
}

/// How keys are mapped to shards.
///
/// Fixed at construction. `Range` and `Hash` are deterministic and
/// load-blind; `LoadAware` and `Intelligent` divert inserts away from
/// hotspots, relying on the redirect index to keep lookups correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingStrategy {
    /// `shard = range_index(key) % shards`. Preserves key locality but is
    /// trivially exploitable by a strided key sequence.
    Range,
    /// `shard = hash(key) % shards`. Spreads keys; no load awareness.
    Hash,
    /// Hash placement, plus sequential diversion away from hotspots.
    LoadAware,
    /// Consistent-hash ring with virtual nodes; no load awareness.
    VirtualNodes,
    /// Ring placement, plus diversion along the ring away from hotspots.
    #[default]
    Intelligent,
}

/// Configuration for a ShardTree instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) shard_count: usize,
    pub(crate) strategy: RoutingStrategy,
    pub(crate) hotspot_ratio: f64,
    pub(crate) hotspot_floor: u64,
    pub(crate) virtual_nodes: usize,
    pub(crate) hash_function: HashFunction,
}

impl Config {
    /// Create a new config with defaults (8 shards, intelligent routing,
    /// hotspot ratio 1.5 over floor 100, 150 virtual nodes per shard).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of shards. Must be greater than 0.
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::InvalidShardCount);
        }
        self.shard_count = count;
        Ok(self)
    }

    /// Set the routing strategy.
    pub fn strategy(mut self, strategy: RoutingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the hotspot ratio: a shard is hot when its load exceeds this
    /// multiple of the mean load. Must be at least 1.0.
    pub fn hotspot_ratio(mut self, ratio: f64) -> Result<Self, Error> {
        if ratio.is_nan() || ratio < 1.0 {
            return Err(Error::InvalidHotspotRatio);
        }
        self.hotspot_ratio = ratio;
        Ok(self)
    }

    /// Set the absolute load floor below which a shard is never considered
    /// hot. Guards against false positives right after startup.
    pub fn hotspot_floor(mut self, floor: u64) -> Self {
        self.hotspot_floor = floor;
        self
    }

    /// Set the virtual-node replication factor for ring-based strategies.
    /// Must be greater than 0.
    pub fn virtual_nodes(mut self, count: usize) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::InvalidVirtualNodes);
        }
        self.virtual_nodes = count;
        Ok(self)
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.hash_function = hash_fn;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: 8,
            strategy: RoutingStrategy::Intelligent,
            hotspot_ratio: 1.5,
            hotspot_floor: 100,
            virtual_nodes: 150,
            hash_function: HashFunction::AHash,
        }
    }
}

/// Builder for creating a ShardTree with custom configuration.
#[derive(Debug)]
pub struct ShardTreeBuilder {
    config: Config,
}

impl ShardTreeBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the number of shards. Must be greater than 0.
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.shard_count(count)?;
        Ok(self)
    }

    /// Set the routing strategy.
    pub fn strategy(mut self, strategy: RoutingStrategy) -> Self {
        self.config = self.config.strategy(strategy);
        self
    }

    /// Set the hotspot ratio. Must be at least 1.0.
    pub fn hotspot_ratio(mut self, ratio: f64) -> Result<Self, Error> {
        self.config = self.config.hotspot_ratio(ratio)?;
        Ok(self)
    }

    /// Set the absolute hotspot load floor.
    pub fn hotspot_floor(mut self, floor: u64) -> Self {
        self.config = self.config.hotspot_floor(floor);
        self
    }

    /// Set the virtual-node replication factor. Must be greater than 0.
    pub fn virtual_nodes(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.virtual_nodes(count)?;
        Ok(self)
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.config = self.config.hash_function(hash_fn);
        self
    }

    /// Build a ShardTree with the configured settings.
    pub fn build<K, V>(self) -> crate::ShardTree<K, V>
    where
        K: Ord + std::hash::Hash + crate::hash::RangeKey + Clone + Send + Sync,
        V: Send + Sync,
    {
        crate::ShardTree::with_config(self.config)
    }
}

impl Default for ShardTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a key hasher instance based on the configuration.
pub(crate) fn create_hasher(hash_fn: HashFunction) -> KeyHasher {
    match hash_fn {
        HashFunction::AHash => KeyHasher::AHash,
        #[cfg(feature = "fxhash")]
        HashFunction::FxHash => KeyHasher::FxHash,
    }
}
