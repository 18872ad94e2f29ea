/// Errors that can occur when operating on a ShardTree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The requested key was not found in the store.
    NotFound,
    /// The store has no entries, so there is no min/max key.
    Empty,
    /// The shard count is invalid (must be greater than 0).
    InvalidShardCount,
    /// The hotspot ratio is invalid (must be at least 1.0).
    InvalidHotspotRatio,
    /// The virtual-node replication factor is invalid (must be greater than 0).
    InvalidVirtualNodes,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound => write!(f, "key not found"),
            Error::Empty => write!(f, "store is empty"),
            Error::InvalidShardCount => {
                write!(f, "shard count must be greater than 0")
            }
            Error::InvalidHotspotRatio => {
                write!(f, "hotspot ratio must be at least 1.0")
            }
            Error::InvalidVirtualNodes => {
                write!(f, "virtual-node replication factor must be greater than 0")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Error returned when an internal data-structure invariant is violated.
///
/// Produced by the `check_invariants` methods on [`AvlTree`](crate::tree::AvlTree)
/// and [`ShardTree`](crate::ShardTree). Carries a human-readable description
/// of which invariant failed. A violation is always a bug in this crate, not
/// a recoverable condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(Error::NotFound.to_string(), "key not found");
        assert_eq!(Error::Empty.to_string(), "store is empty");
        assert!(Error::InvalidShardCount.to_string().contains("shard count"));
        assert!(Error::InvalidHotspotRatio.to_string().contains("1.0"));
        assert!(Error::InvalidVirtualNodes.to_string().contains("replication"));
    }

    #[test]
    fn invariant_error_message() {
        let err = InvariantError::new("height mismatch at node 4");
        assert_eq!(err.message(), "height mismatch at node 4");
        assert_eq!(err.to_string(), "height mismatch at node 4");
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<Error>();
        assert_error::<InvariantError>();
    }
}
