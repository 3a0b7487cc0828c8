// src/plan/plan.rs

//! The finalized execution plan and its per-node state machine.

use tracing::{debug, warn};

use crate::cross_build::{PeerTaskIdentifier, PeerTaskState};
use crate::engine::{CompletionOutcome, NodeCompletion, WorkOutcome};
use crate::plan::node::{
    DependenciesState, Node, NodeId, NodeKind, NodeState, ScheduledWork,
};

/// Nodes that became ready in one sweep, split by how they are executed.
#[derive(Debug, Default)]
pub struct ReadyNodes {
    /// Task nodes to hand to the executor backend.
    pub work: Vec<ScheduledWork>,
    /// Cross-build nodes to queue on their peer build's graph.
    pub peer_tasks: Vec<(NodeId, PeerTaskIdentifier)>,
}

impl ReadyNodes {
    pub fn is_empty(&self) -> bool {
        self.work.is_empty() && self.peer_tasks.is_empty()
    }
}

/// Aggregated result of a finished plan.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// Completion records in the order they were produced.
    pub completions: Vec<NodeCompletion>,
    /// The subset of completions that failed, as (node, cause) pairs.
    pub failures: Vec<PlanFailure>,
    /// Whether the plan was cancelled before finishing.
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct PlanFailure {
    pub node: String,
    pub cause: String,
}

impl PlanOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Owns every node of one build invocation for the plan's whole lifetime.
///
/// All state transitions go through this type and are serialized by the
/// owning scheduler; only node *execution* (the task's actual work) runs on
/// worker threads, and it reports back through events.
#[derive(Debug)]
pub struct ExecutionPlan {
    nodes: Vec<Node>,
    cancelled: bool,
    /// Completion records not yet handed to the reporting layer.
    pending_completions: Vec<NodeCompletion>,
    /// Full completion log for the final outcome.
    all_completions: Vec<NodeCompletion>,
}

impl ExecutionPlan {
    pub(crate) fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            cancelled: false,
            pending_completions: Vec::new(),
            all_completions: Vec::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find a task node by its path (diagnostics and tests).
    pub fn find_task(&self, path: &str) -> Option<NodeId> {
        self.nodes.iter().find_map(|n| match n.kind() {
            NodeKind::Task(task) if task.path == path => Some(n.id()),
            _ => None,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether no node can make further progress.
    pub fn is_finished(&self) -> bool {
        self.nodes.iter().all(|n| n.state().is_terminal())
    }

    /// Sweep the plan for nodes whose dependencies have settled.
    ///
    /// - Ready task nodes move to `Queued` and are returned for dispatch.
    /// - Ready ordinal anchors complete inline (they are no-ops).
    /// - Ready cross-build nodes move to `Queued` and are returned so the
    ///   shell can queue them on the peer build.
    /// - Nodes whose dependencies completed unsuccessfully are skipped,
    ///   transitively.
    ///
    /// Runs to a fixpoint, since anchor completions and skips can unblock or
    /// doom further nodes in the same sweep.
    pub fn collect_ready(&mut self) -> ReadyNodes {
        let mut ready = ReadyNodes::default();
        if self.cancelled {
            return ready;
        }

        loop {
            let mut changed = false;

            for index in 0..self.nodes.len() {
                if self.nodes[index].state() != NodeState::Waiting {
                    continue;
                }
                let id = NodeId(index);
                let deps_state = self.check_predecessors(id);

                match deps_state {
                    DependenciesState::NotComplete => {}
                    DependenciesState::CompleteAndNotSuccessful => {
                        self.mark_skipped(id, CompletionOutcome::Skipped);
                        changed = true;
                    }
                    DependenciesState::CompleteAndSuccessful => match self.nodes[index].kind() {
                        NodeKind::Task(task) => {
                            let work = ScheduledWork::from_task(id, task);
                            self.nodes[index].set_state(NodeState::Queued);
                            debug!(node = %self.nodes[index].display_name(), "node ready; queueing for execution");
                            ready.work.push(work);
                        }
                        NodeKind::OrdinalAnchor { .. } => {
                            // Ordering anchor: completes the moment its
                            // predecessors settle.
                            self.nodes[index].set_state(NodeState::Succeeded);
                            changed = true;
                        }
                        NodeKind::CrossBuildTask(peer) => {
                            let identifier = peer.identifier.clone();
                            self.nodes[index].set_state(NodeState::Queued);
                            debug!(node = %self.nodes[index].display_name(), "cross-build node ready; queueing on peer build");
                            ready.peer_tasks.push((id, identifier));
                        }
                    },
                }
            }

            if !changed {
                return ready;
            }
        }
    }

    /// Record that a queued node has started executing.
    pub fn node_started(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        debug_assert_eq!(node.state(), NodeState::Queued);
        node.set_state(NodeState::Executing);
    }

    /// Record the outcome of an executed node.
    pub fn node_finished(&mut self, id: NodeId, outcome: WorkOutcome) {
        let node = &mut self.nodes[id.index()];
        if node.state().is_terminal() {
            warn!(node = %node.display_name(), "completion for already-terminal node; ignoring");
            return;
        }

        match outcome {
            WorkOutcome::Success => {
                node.set_state(NodeState::Succeeded);
                self.record_completion(id, CompletionOutcome::Succeeded, None);
            }
            WorkOutcome::Failed(code) => {
                let cause = format!("exited with code {code}");
                node.record_failure(cause.clone());
                self.record_completion(id, CompletionOutcome::Failed, Some(cause));
            }
        }
    }

    /// Mirror a peer build's task state into the corresponding node.
    pub fn peer_state_changed(&mut self, id: NodeId, state: PeerTaskState) {
        let node = &mut self.nodes[id.index()];
        node.update_peer_state(state);

        if node.state().is_terminal() {
            return;
        }
        match state {
            PeerTaskState::Waiting => {}
            PeerTaskState::Success => {
                node.set_state(NodeState::Succeeded);
                self.record_completion(id, CompletionOutcome::Succeeded, None);
            }
            PeerTaskState::Failed => {
                let cause = match node.peer_identifier() {
                    Some(id) => format!("failed in build '{}'", id.build),
                    None => "failed in peer build".to_string(),
                };
                node.record_failure(cause.clone());
                self.record_completion(id, CompletionOutcome::Failed, Some(cause));
            }
        }
    }

    /// Stop scheduling: every node that has not started is marked skipped
    /// and reported as `NotRequired`; executing nodes run to completion.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;

        for index in 0..self.nodes.len() {
            let state = self.nodes[index].state();
            if matches!(state, NodeState::Waiting | NodeState::Queued) {
                self.mark_skipped(NodeId(index), CompletionOutcome::NotRequired);
            }
        }
    }

    /// Completion records produced since the last call.
    pub fn take_completions(&mut self) -> Vec<NodeCompletion> {
        std::mem::take(&mut self.pending_completions)
    }

    /// Final aggregated result; call once the plan is finished.
    pub fn outcome(&self) -> PlanOutcome {
        let failures = self
            .all_completions
            .iter()
            .filter(|c| c.outcome == CompletionOutcome::Failed)
            .map(|c| PlanFailure {
                node: c.node.clone(),
                cause: c.failure.clone().unwrap_or_else(|| "unknown failure".to_string()),
            })
            .collect();

        PlanOutcome {
            completions: self.all_completions.clone(),
            failures,
            cancelled: self.cancelled,
        }
    }

    fn check_predecessors(&self, id: NodeId) -> DependenciesState {
        self.nodes[id.index()].check_predecessors(|dep| self.nodes[dep.index()].state())
    }

    fn mark_skipped(&mut self, id: NodeId, outcome: CompletionOutcome) {
        let node = &mut self.nodes[id.index()];
        node.set_state(NodeState::Skipped);
        debug!(node = %node.display_name(), ?outcome, "node will not run");
        self.record_completion(id, outcome, None);
    }

    fn record_completion(
        &mut self,
        id: NodeId,
        outcome: CompletionOutcome,
        failure: Option<String>,
    ) {
        let node = &self.nodes[id.index()];
        // Anchors are synthetic ordering devices; the reporting layer only
        // sees real work.
        if matches!(node.kind(), NodeKind::OrdinalAnchor { .. }) {
            return;
        }
        let completion = NodeCompletion {
            node: node.display_name(),
            outcome,
            failure,
        };
        self.pending_completions.push(completion.clone());
        self.all_completions.push(completion);
    }
}
