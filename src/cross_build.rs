// src/cross_build.rs

//! Boundary to peer builds in the same build tree.
//!
//! A cross-build task node does no work locally: the peer build's own graph
//! executes the task and owns its locking. Completion crosses the boundary
//! as a [`RuntimeEvent::PeerTaskUpdated`] message on the runtime channel,
//! never as a blocking wait on a worker. This keeps the concurrency contract
//! explicit and lets tests drive the peer side deterministically.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::RuntimeEvent;
use crate::errors::{Result, TaskplanError};
use crate::plan::NodeId;

/// State of a task in a peer build, as mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerTaskState {
    Waiting,
    Success,
    Failed,
}

impl PeerTaskState {
    pub fn is_complete(self) -> bool {
        !matches!(self, PeerTaskState::Waiting)
    }
}

/// Identifies a task inside a specific peer build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerTaskIdentifier {
    pub build: String,
    pub task_path: String,
}

impl std::fmt::Display for PeerTaskIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.build, self.task_path)
    }
}

/// Locates tasks in peer builds' work graphs.
pub trait PeerBuildController: Send + Sync {
    fn locate_task(&self, id: &PeerTaskIdentifier) -> Result<Arc<dyn PeerTaskHandle>>;
}

/// Handle to a single task queued (or queueable) on a peer build.
pub trait PeerTaskHandle: Send + Sync {
    /// Queue the task for execution on the peer graph.
    ///
    /// Must return promptly: implementations post
    /// `RuntimeEvent::PeerTaskUpdated { node, .. }` to `events` when the
    /// peer task settles instead of blocking the caller.
    fn queue_for_execution(&self, node: NodeId, events: mpsc::Sender<RuntimeEvent>);

    /// Current state of the peer task.
    fn state(&self) -> PeerTaskState;
}

/// Controller for plans with no included builds; locating any task fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeerBuilds;

impl PeerBuildController for NoPeerBuilds {
    fn locate_task(&self, id: &PeerTaskIdentifier) -> Result<Arc<dyn PeerTaskHandle>> {
        Err(TaskplanError::PeerTaskNotFound {
            build: id.build.clone(),
            task: id.task_path.clone(),
        })
    }
}
