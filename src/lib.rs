//! # ShardTree
//!
//! A concurrent ordered map that shards a height-balanced tree across N
//! independent partitions and routes keys to shards through an adaptive,
//! hotspot-aware policy.
//!
//! Each shard owns an AVL tree behind its own read-write lock, so
//! operations on different shards don't block each other. The router
//! tracks per-shard load and, under the load-aware strategies, diverts
//! inserts away from overloaded shards; a redirect index records every
//! diverted key so later lookups still land on the right shard in at most
//! one extra probe. When the load distribution degrades anyway, an
//! explicit rebalance migrates entries between shards under a global
//! barrier. Values are stored behind `Arc<T>` so reads are zero-copy.
//!
//! ## Features
//!
//! - **Scalable throughput**: sharded design minimizes lock contention
//! - **Hotspot defense**: adaptive routing spreads adversarial key patterns
//! - **Ordered**: in-order iteration and min/max within each shard's tree
//! - **Linearizable lookups**: the redirect index keeps diverted keys findable
//! - **Dynamic rebalancing**: explicit migration from overloaded shards
//! - **Statistics**: per-shard op tracking, balance score, redirect metrics
//!
//! ## Example
//!
//! ```rust
//! use shardtree::ShardTree;
//!
//! let store = ShardTree::new();
//!
//! store.put(10u64, "ten");
//! store.put(20u64, "twenty");
//!
//! assert_eq!(*store.get(&10).unwrap(), "ten");
//! assert!(store.contains(&20));
//! assert_eq!(store.len(), 2);
//!
//! // Load distribution introspection
//! let diag = store.diagnostics();
//! assert_eq!(diag.total_entries, 2);
//!
//! // Maintenance: migrate entries if the distribution degraded
//! if store.should_rebalance(0.7) {
//!     store.rebalance(2.0);
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use shardtree::{ShardTreeBuilder, RoutingStrategy};
//!
//! let store = ShardTreeBuilder::new()
//!     .shard_count(16)?
//!     .strategy(RoutingStrategy::LoadAware)
//!     .hotspot_ratio(2.0)?
//!     .hotspot_floor(50)
//!     .build::<u64, String>();
//! # Ok::<(), shardtree::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Configuration and builder types.
pub mod config;
/// Error types.
pub mod error;
/// Key routing inputs: hashing and the range-routing key trait.
pub mod hash;
/// Iterator implementations.
pub mod iter;
/// Redirect index: keeps diverted keys findable.
mod redirect;
/// Adaptive router: strategies, load tracking, hotspot detection.
mod router;
/// Internal shard implementation.
mod shard;
/// Statistics and metrics collection.
pub mod stats;
/// Top-level sharded store.
pub mod store;
/// The per-shard balanced ordered map.
pub mod tree;

// Re-export main types
pub use config::{Config, HashFunction, RoutingStrategy, ShardTreeBuilder};
pub use error::{Error, InvariantError};
pub use hash::RangeKey;
pub use stats::{Diagnostics, RedirectStats, ShardDiagnostics, ShardOps, Stats};
pub use store::ShardTree;
pub use tree::AvlTree;
