//! The interest oracle: externally mutable "is this row of interest" state.
//!
//! The cache consults the oracle once per scanned row and freezes the answer
//! in the window slot. The host mutates the oracle (user hilites a row,
//! clears all hilites) and then tells the cache what changed via
//! [`notify_interest_changed`](crate::cache::RowWindowCache::notify_interest_changed)
//! so frozen bits can be re-synced without guessing.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::row::RowKey;

/// Answers whether a row key is currently of interest.
///
/// Implementations supply their own interior mutability; the cache only
/// ever reads.
pub trait InterestOracle {
    /// Whether the row identified by `key` is currently of interest.
    fn is_of_interest(&self, key: RowKey) -> bool;
}

impl InterestOracle for HashSet<RowKey> {
    fn is_of_interest(&self, key: RowKey) -> bool {
        self.contains(&key)
    }
}

/// A cheaply clonable, shared interest set.
///
/// The host keeps one clone to mutate and hands another to the cache to
/// observe. Reads vastly outnumber writes, hence the `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct SharedInterestSet {
    inner: Arc<RwLock<HashSet<RowKey>>>,
}

impl SharedInterestSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key. Returns `true` if it was not already present.
    pub fn insert(&self, key: RowKey) -> bool {
        self.inner.write().unwrap().insert(key)
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn remove(&self, key: RowKey) -> bool {
        self.inner.write().unwrap().remove(&key)
    }

    /// Remove every key, returning the keys that were present.
    ///
    /// The returned set is what
    /// [`notify_interest_cleared_all`](crate::cache::RowWindowCache::notify_interest_cleared_all)
    /// conceptually re-syncs against.
    pub fn clear(&self) -> Vec<RowKey> {
        self.inner.write().unwrap().drain().collect()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: RowKey) -> bool {
        self.inner.read().unwrap().contains(&key)
    }

    /// Number of keys currently in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// A copy of the current keys.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RowKey> {
        self.inner.read().unwrap().iter().copied().collect()
    }
}

impl InterestOracle for SharedInterestSet {
    fn is_of_interest(&self, key: RowKey) -> bool {
        self.contains(key)
    }
}
