// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Async mutexes keyed by id, created on first use.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Serializes work per key. An entry lives only while some caller holds or
/// waits on it.
#[derive(Clone)]
pub(crate) struct KeyedLocks<K: Eq + Hash> {
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Run `work` while holding the lock for `key`.
    pub(crate) async fn run<T, F>(&self, key: K, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            work.await
        };

        // Clones are only handed out under the shard lock, so a count of one
        // here means nobody else is holding or waiting.
        drop(lock);
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
