// src/exec/locks.rs

//! Named resource locks shared between workers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of named resource locks.
///
/// Workers hold every lock a node declares for the duration of its process.
/// Locks are always acquired in sorted name order so two workers wanting
/// overlapping lock sets cannot deadlock each other.
#[derive(Debug, Clone, Default)]
pub struct ResourceLockRegistry {
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ResourceLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Acquire all named locks, in sorted order, deduplicated. The returned
    /// guards release on drop.
    pub async fn acquire_all(&self, names: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<&String> = names.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for name in sorted {
            guards.push(self.lock_for(name).lock_owned().await);
        }
        guards
    }
}
