// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production worker pool in [`worker`](super::worker).
//!
//! - `ProcessExecutorBackend` is the default implementation. It wraps the
//!   worker pool spawned by `spawn_executor` and forwards scheduled work over
//!   an mpsc channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which nodes were dispatched and directly emits `NodeCompleted` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::plan::ScheduledWork;

use super::locks::ResourceLockRegistry;
use super::worker::spawn_executor;

/// Trait abstracting how scheduled work is executed.
///
/// Production code uses [`ProcessExecutorBackend`]; tests can provide their
/// own implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Dispatch the given work for execution.
    ///
    /// The implementation is free to:
    /// - spawn OS processes (production)
    /// - simulate completion and emit `RuntimeEvent`s (tests)
    fn dispatch(
        &mut self,
        work: Vec<ScheduledWork>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Process-spawning executor backend used in production.
///
/// Internally, this wraps the worker pool in [`spawn_executor`]. The runtime
/// calls `dispatch`, which forwards the work to the background workers via
/// an mpsc channel.
pub struct ProcessExecutorBackend {
    tx: mpsc::Sender<ScheduledWork>,
}

impl ProcessExecutorBackend {
    /// Create a new process executor backend, wiring it to the given runtime
    /// event sender.
    ///
    /// This spawns the background worker pool immediately.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        locks: ResourceLockRegistry,
        max_workers: usize,
    ) -> Self {
        let tx = spawn_executor(runtime_tx, locks, max_workers);
        Self { tx }
    }
}

impl ExecutorBackend for ProcessExecutorBackend {
    fn dispatch(
        &mut self,
        work: Vec<ScheduledWork>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for item in work {
                tx.send(item).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }
}
