//! Id-scoped exclusive locks
//!
//! Claim and batch transitions must be serialized per entity id (two vetters
//! finalizing the same claim, two operators submitting the same batch). The
//! engine runs inside synchronous request cycles, so contention is reported
//! immediately rather than waited out; the caller maps it to a
//! concurrency-conflict error and the user retries.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Lock acquisition failed because another transition holds the id
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Resource is locked by another in-flight transition")]
pub struct LockContention;

/// A set of exclusive locks keyed by entity id
#[derive(Debug, Default)]
pub struct LockMap<K: Eq + Hash + Copy> {
    held: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash + Copy> LockMap<K> {
    pub fn new() -> Self {
        Self {
            held: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Acquires the lock for `key`, or reports contention if already held.
    /// The lock is released when the returned guard drops.
    pub fn acquire(&self, key: K) -> Result<LockGuard<K>, LockContention> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key) {
            return Err(LockContention);
        }
        Ok(LockGuard {
            held: Arc::clone(&self.held),
            key,
        })
    }

    /// True if the id is currently locked
    pub fn is_held(&self, key: &K) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// RAII guard for an acquired id lock
#[derive(Debug)]
pub struct LockGuard<K: Eq + Hash + Copy> {
    held: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash + Copy> Drop for LockGuard<K> {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
