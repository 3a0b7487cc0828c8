// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands attached to
//! plan nodes, using `tokio::process::Command`, and reporting back to the
//! scheduling runtime via `RuntimeEvent`s.
//!
//! - [`worker`] owns the bounded worker pool that runs node processes.
//! - [`locks`] provides the shared named resource locks workers hold while
//!   a process runs.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `ProcessExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod locks;
pub mod worker;

pub use backend::{ExecutorBackend, ProcessExecutorBackend};
pub use locks::ResourceLockRegistry;
pub use worker::spawn_executor;
