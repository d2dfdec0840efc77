// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Keyed run-once memoization
//!
//! The first caller for a key runs the operation; everyone else, then and
//! later, gets the stored outcome.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Outcomes of operations that must run at most once per key
pub struct OnceMap<K, E> {
    cells: Mutex<HashMap<K, Arc<OnceCell<Result<(), E>>>>>,
}

impl<K, E> OnceMap<K, E>
where
    K: Eq + Hash,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` unless `key` has already been visited
    pub async fn run_once<F, Fut>(&self, key: K, op: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let cell = {
            let mut cells = match self.cells.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cells.entry(key).or_default().clone()
        };

        cell.get_or_init(op).await.clone()
    }

    /// Stored outcome for `key`, if it has run
    pub fn outcome(&self, key: &K) -> Option<Result<(), E>> {
        let cells = match self.cells.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Drop a stored failure for `key` so the next caller runs again
    ///
    /// Successes and operations still in flight are left alone.
    pub fn forget_failure(&self, key: &K) {
        let mut cells = match self.cells.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if cells
            .get(key)
            .is_some_and(|cell| matches!(cell.get(), Some(Err(_))))
        {
            cells.remove(key);
        }
    }
}

impl<K, E> Default for OnceMap<K, E>
where
    K: Eq + Hash,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
