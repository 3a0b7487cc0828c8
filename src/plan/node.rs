// src/plan/node.rs

//! The schedulable unit of the execution plan.
//!
//! A [`Node`] is either a concrete task, a synthetic ordinal anchor, or a
//! task whose execution is owned by a peer build's graph. The set of
//! variants is closed, so they live behind a sum type ([`NodeKind`]) rather
//! than a trait object.

use std::path::PathBuf;

use crate::cross_build::{PeerTaskIdentifier, PeerTaskState};

/// Index of a node inside its owning [`ExecutionPlan`](crate::plan::ExecutionPlan).
///
/// Nodes are owned exclusively by the plan for its whole lifetime; they are
/// referred to by id everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Execution progress of a node.
///
/// `Waiting -> Queued -> Executing -> {Succeeded, Failed, Skipped}`.
/// `Skipped` is reached directly from `Waiting`/`Queued` when a dependency
/// fails or the plan is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet ready; at least one dependency has not completed.
    Waiting,
    /// Dependencies satisfied; handed to the dispatch layer.
    Queued,
    /// Work in flight (process running, or peer build executing).
    Executing,
    Succeeded,
    Failed,
    /// Never executed: upstream failure or plan cancellation.
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Succeeded | NodeState::Failed | NodeState::Skipped
        )
    }

    pub fn is_successful(self) -> bool {
        self == NodeState::Succeeded
    }
}

/// Result of checking a node's predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependenciesState {
    NotComplete,
    CompleteAndSuccessful,
    CompleteAndNotSuccessful,
}

/// Which location a synthetic ordinal anchor stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    /// "All destroyer work of this ordinal has reached this point."
    DestroyerLocation,
    /// "All producer work of this ordinal has reached this point."
    ProducerLocation,
}

impl AnchorKind {
    pub fn describe(self) -> &'static str {
        match self {
            AnchorKind::DestroyerLocation => "destroyer location",
            AnchorKind::ProducerLocation => "producer location",
        }
    }
}

/// Static payload of a concrete task node.
#[derive(Debug, Clone)]
pub struct TaskPayload {
    /// Stable task identity (e.g. `:app:build`).
    pub path: String,
    /// Shell command to run; `None` for no-op tasks.
    pub command: Option<String>,
    /// Ordinal of the entry batch this task belongs to.
    pub ordinal: usize,
    /// Declared filesystem reads.
    pub inputs: Vec<PathBuf>,
    /// Declared filesystem writes.
    pub outputs: Vec<PathBuf>,
    /// Declared filesystem deletions.
    pub destroys: Vec<PathBuf>,
    /// Named resource locks that must be held while executing.
    pub locks: Vec<String>,
    /// Project this task belongs to (scopes the input hierarchy).
    pub project: Option<String>,
}

/// Payload of a task that lives in a peer build's execution graph.
///
/// The peer build owns completion, resource locking and project ownership;
/// locally this node only mirrors the peer's state.
#[derive(Debug, Clone)]
pub struct CrossBuildPayload {
    pub identifier: PeerTaskIdentifier,
    /// Ordinal of the entry batch that pulled this task in.
    pub ordinal: usize,
    /// Local mirror of the peer task's state, updated from runtime events.
    pub peer_state: PeerTaskState,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Task(TaskPayload),
    OrdinalAnchor { kind: AnchorKind, ordinal: usize },
    CrossBuildTask(CrossBuildPayload),
}

/// A node of the execution plan: kind, state machine, and graph edges.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    state: NodeState,
    /// Predecessors that must complete successfully before this node runs.
    dependencies: Vec<NodeId>,
    /// Inverse edges, filled in when the plan is finalized.
    dependents: Vec<NodeId>,
    /// Nodes that must not outlive this one. Cross-build nodes refuse these,
    /// since completion is owned by the other build.
    lifecycle_successors: Vec<NodeId>,
    /// Failure cause recorded on the node; never thrown into the scheduler.
    failure: Option<String>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            state: NodeState::Waiting,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            lifecycle_successors: Vec::new(),
            failure: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn dependents(&self) -> &[NodeId] {
        &self.dependents
    }

    /// Ordinal of the batch this node belongs to.
    pub fn ordinal(&self) -> usize {
        match &self.kind {
            NodeKind::Task(task) => task.ordinal,
            NodeKind::OrdinalAnchor { ordinal, .. } => *ordinal,
            NodeKind::CrossBuildTask(peer) => peer.ordinal,
        }
    }

    /// Human-readable identity used in reports and logs.
    pub fn display_name(&self) -> String {
        match &self.kind {
            NodeKind::Task(task) => task.path.clone(),
            NodeKind::OrdinalAnchor { kind, ordinal } => {
                format!("{} of ordinal {ordinal}", kind.describe())
            }
            NodeKind::CrossBuildTask(peer) => format!(
                "task {} in build {}",
                peer.identifier.task_path, peer.identifier.build
            ),
        }
    }

    /// Resource locks this node must hold while executing.
    ///
    /// Cross-build tasks report none: the peer build's own scheduler handles
    /// locking for them. Anchors execute as no-ops and also need none.
    pub fn locks(&self) -> &[String] {
        match &self.kind {
            NodeKind::Task(task) => &task.locks,
            NodeKind::OrdinalAnchor { .. } | NodeKind::CrossBuildTask(_) => &[],
        }
    }

    /// Project that owns this node, if any.
    ///
    /// Cross-build tasks report none for the same reason as [`Node::locks`].
    pub fn owning_project(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Task(task) => task.project.as_deref(),
            NodeKind::OrdinalAnchor { .. } | NodeKind::CrossBuildTask(_) => None,
        }
    }

    pub(crate) fn add_dependency(&mut self, dep: NodeId) {
        if dep != self.id && !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
    }

    pub(crate) fn add_dependent(&mut self, dep: NodeId) {
        if dep != self.id && !self.dependents.contains(&dep) {
            self.dependents.push(dep);
        }
    }

    /// Attach lifecycle successors.
    ///
    /// # Panics
    ///
    /// Panics for cross-build nodes when `successors` is non-empty; that is
    /// a defect in graph construction, not a user-facing condition.
    pub fn set_lifecycle_successors(&mut self, successors: Vec<NodeId>) {
        if matches!(self.kind, NodeKind::CrossBuildTask(_)) && !successors.is_empty() {
            panic!(
                "cannot attach lifecycle successors to {}: completion is owned by the other build",
                self.display_name()
            );
        }
        self.lifecycle_successors = successors;
    }

    pub fn lifecycle_successors(&self) -> &[NodeId] {
        &self.lifecycle_successors
    }

    pub(crate) fn set_state(&mut self, state: NodeState) {
        self.state = state;
    }

    pub(crate) fn record_failure(&mut self, cause: String) {
        self.state = NodeState::Failed;
        self.failure = Some(cause);
    }

    pub(crate) fn update_peer_state(&mut self, state: PeerTaskState) {
        if let NodeKind::CrossBuildTask(peer) = &mut self.kind {
            peer.peer_state = state;
        }
    }

    pub(crate) fn peer_identifier(&self) -> Option<&PeerTaskIdentifier> {
        match &self.kind {
            NodeKind::CrossBuildTask(peer) => Some(&peer.identifier),
            _ => None,
        }
    }

    /// Check this node's local predecessors against the given state lookup.
    ///
    /// Ordinal anchors are ordering-only: any terminal predecessor state
    /// satisfies them, so a failed group member does not skip-cascade
    /// through the anchor chain.
    pub(crate) fn check_predecessors<F>(&self, state_of: F) -> DependenciesState
    where
        F: Fn(NodeId) -> NodeState,
    {
        let ordering_only = matches!(self.kind, NodeKind::OrdinalAnchor { .. });

        for &dep in &self.dependencies {
            let state = state_of(dep);
            if !state.is_terminal() {
                return DependenciesState::NotComplete;
            }
            if !ordering_only && !state.is_successful() {
                return DependenciesState::CompleteAndNotSuccessful;
            }
        }
        DependenciesState::CompleteAndSuccessful
    }

    /// Full dependency check: local predecessors, plus the peer-state mirror
    /// for cross-build nodes. A cross-build node whose predecessors have
    /// succeeded stays `NotComplete` until the peer task settles.
    pub(crate) fn check_dependencies_complete<F>(&self, state_of: F) -> DependenciesState
    where
        F: Fn(NodeId) -> NodeState,
    {
        let predecessors = self.check_predecessors(state_of);
        if predecessors != DependenciesState::CompleteAndSuccessful {
            return predecessors;
        }

        match &self.kind {
            NodeKind::CrossBuildTask(peer) => match peer.peer_state {
                PeerTaskState::Waiting => DependenciesState::NotComplete,
                PeerTaskState::Success => DependenciesState::CompleteAndSuccessful,
                PeerTaskState::Failed => DependenciesState::CompleteAndNotSuccessful,
            },
            _ => DependenciesState::CompleteAndSuccessful,
        }
    }
}

/// Description of a task node the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledWork {
    pub node: NodeId,
    pub path: String,
    pub command: Option<String>,
    pub locks: Vec<String>,
    pub ordinal: usize,
}

impl ScheduledWork {
    pub(crate) fn from_task(node: NodeId, task: &TaskPayload) -> Self {
        Self {
            node,
            path: task.path.clone(),
            command: task.command.clone(),
            locks: task.locks.clone(),
            ordinal: task.ordinal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_node(id: usize) -> Node {
        Node::new(
            NodeId(id),
            NodeKind::Task(TaskPayload {
                path: format!(":t{id}"),
                command: None,
                ordinal: 0,
                inputs: vec![],
                outputs: vec![],
                destroys: vec![],
                locks: vec![],
                project: None,
            }),
        )
    }

    #[test]
    fn task_dependency_check_requires_success() {
        let mut node = task_node(0);
        node.add_dependency(NodeId(1));
        node.add_dependency(NodeId(2));

        let check = |states: [NodeState; 3]| {
            node.check_dependencies_complete(|id| states[id.index()])
        };

        assert_eq!(
            check([NodeState::Waiting, NodeState::Succeeded, NodeState::Executing]),
            DependenciesState::NotComplete
        );
        assert_eq!(
            check([NodeState::Waiting, NodeState::Succeeded, NodeState::Succeeded]),
            DependenciesState::CompleteAndSuccessful
        );
        assert_eq!(
            check([NodeState::Waiting, NodeState::Failed, NodeState::Succeeded]),
            DependenciesState::CompleteAndNotSuccessful
        );
        assert_eq!(
            check([NodeState::Waiting, NodeState::Skipped, NodeState::Succeeded]),
            DependenciesState::CompleteAndNotSuccessful
        );
    }

    #[test]
    fn anchor_dependency_check_ignores_failure() {
        let mut anchor = Node::new(
            NodeId(0),
            NodeKind::OrdinalAnchor {
                kind: AnchorKind::DestroyerLocation,
                ordinal: 1,
            },
        );
        anchor.add_dependency(NodeId(1));

        assert_eq!(
            anchor.check_dependencies_complete(|_| NodeState::Failed),
            DependenciesState::CompleteAndSuccessful
        );
        assert_eq!(
            anchor.check_dependencies_complete(|_| NodeState::Executing),
            DependenciesState::NotComplete
        );
    }

    #[test]
    #[should_panic(expected = "lifecycle successors")]
    fn cross_build_node_refuses_lifecycle_successors() {
        let mut node = Node::new(
            NodeId(0),
            NodeKind::CrossBuildTask(CrossBuildPayload {
                identifier: PeerTaskIdentifier {
                    build: "lib".to_string(),
                    task_path: ":lib:jar".to_string(),
                },
                ordinal: 0,
                peer_state: PeerTaskState::Waiting,
            }),
        );
        node.set_lifecycle_successors(vec![NodeId(1)]);
    }

    #[test]
    fn cross_build_dependency_check_mirrors_peer_state() {
        let mut node = Node::new(
            NodeId(0),
            NodeKind::CrossBuildTask(CrossBuildPayload {
                identifier: PeerTaskIdentifier {
                    build: "lib".to_string(),
                    task_path: ":lib:jar".to_string(),
                },
                ordinal: 0,
                peer_state: PeerTaskState::Waiting,
            }),
        );

        assert_eq!(
            node.check_dependencies_complete(|_| NodeState::Succeeded),
            DependenciesState::NotComplete
        );

        node.update_peer_state(PeerTaskState::Success);
        assert_eq!(
            node.check_dependencies_complete(|_| NodeState::Succeeded),
            DependenciesState::CompleteAndSuccessful
        );

        node.update_peer_state(PeerTaskState::Failed);
        assert_eq!(
            node.check_dependencies_complete(|_| NodeState::Succeeded),
            DependenciesState::CompleteAndNotSuccessful
        );
    }
}
