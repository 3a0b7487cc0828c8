// src/engine/mod.rs

//! Scheduling engine for taskplan.
//!
//! This module ties together:
//! - the execution plan (ready-node collection, skip propagation)
//! - the runtime event loop that reacts to:
//!   - worker completion events
//!   - peer-build task state changes
//!   - cancellation
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::cross_build::PeerTaskState;
use crate::plan::NodeId;

/// Outcome of a piece of work as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Success,
    Failed(i32),
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Cancel all remaining work on the first failed node. Default is to
    /// keep running siblings and only skip dependents.
    pub fail_fast: bool,
}

/// Events flowing into the runtime from workers, peer builds, and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A worker finished executing a node.
    NodeCompleted { node: NodeId, outcome: WorkOutcome },
    /// A task in a peer build changed state.
    PeerTaskUpdated { node: NodeId, state: PeerTaskState },
    /// Build-wide cancellation: no new nodes start executing, in-flight
    /// nodes run to completion.
    CancelRequested,
}

/// How a node ended up, as reported to the (external) reporting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Succeeded,
    Failed,
    /// Never executed because a dependency failed or was skipped.
    Skipped,
    /// Never executed because the plan was cancelled.
    NotRequired,
}

/// A single entry of the node-completion event stream.
#[derive(Debug, Clone)]
pub struct NodeCompletion {
    /// Node identity (task path, or peer task description).
    pub node: String,
    pub outcome: CompletionOutcome,
    pub failure: Option<String>,
}

pub mod core;
pub mod runtime;

pub use self::core::{CoreCommand, CoreScheduler, CoreStep};
pub use runtime::Runtime;
