// src/engine/core.rs

//! Pure core scheduler state machine.
//!
//! A synchronous, deterministic core that consumes [`RuntimeEvent`]s and
//! produces a list of commands describing what the IO shell should do next.
//! The async shell (`engine::runtime::Runtime`) is responsible for reading
//! events from channels, dispatching work to the executor, and crossing the
//! peer-build boundary.
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, or processes.

use tracing::{debug, info, warn};

use crate::cross_build::PeerTaskIdentifier;
use crate::engine::{NodeCompletion, RuntimeEvent, RuntimeOptions, WorkOutcome};
use crate::plan::{ExecutionPlan, NodeId, PlanOutcome, ScheduledWork};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these nodes to the executor backend.
    DispatchWork(Vec<ScheduledWork>),
    /// Queue this cross-build node on its peer build's graph.
    QueuePeerTask {
        node: NodeId,
        identifier: PeerTaskIdentifier,
    },
    /// Forward these completion records to the reporting layer.
    ReportCompletions(Vec<NodeCompletion>),
    /// The plan is finished; the runtime loop should stop.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

/// Pure scheduler state: the execution plan plus runtime options.
///
/// It has no channels, no Tokio types, and performs no IO.
#[derive(Debug)]
pub struct CoreScheduler {
    plan: ExecutionPlan,
    options: RuntimeOptions,
}

impl CoreScheduler {
    pub fn new(plan: ExecutionPlan, options: RuntimeOptions) -> Self {
        Self { plan, options }
    }

    /// Read-only view of the plan (for diagnostics and tests).
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Initial sweep: dispatch everything that is ready before any event
    /// has arrived (the roots of the graph).
    pub fn start(&mut self) -> CoreStep {
        info!(nodes = self.plan.node_count(), "starting execution plan");
        self.advance()
    }

    /// Handle a single runtime event, updating plan state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::NodeCompleted { node, outcome } => {
                self.plan.node_finished(node, outcome);
                if matches!(outcome, WorkOutcome::Failed(_)) && self.options.fail_fast {
                    warn!(
                        node = %self.plan.node(node).display_name(),
                        "node failed and fail-fast is set; cancelling remaining work"
                    );
                    self.plan.cancel();
                }
                self.advance()
            }
            RuntimeEvent::PeerTaskUpdated { node, state } => {
                debug!(
                    node = %self.plan.node(node).display_name(),
                    ?state,
                    "peer build task state changed"
                );
                self.plan.peer_state_changed(node, state);
                self.advance()
            }
            RuntimeEvent::CancelRequested => {
                info!("cancellation requested; no new nodes will start");
                self.plan.cancel();
                self.advance()
            }
        }
    }

    /// Final aggregated result; consumes the core.
    pub fn into_outcome(self) -> PlanOutcome {
        self.plan.outcome()
    }

    /// Sweep the plan for ready nodes and turn the result into commands.
    fn advance(&mut self) -> CoreStep {
        let ready = self.plan.collect_ready();
        let mut commands = Vec::new();

        for work in &ready.work {
            self.plan.node_started(work.node);
        }
        if !ready.work.is_empty() {
            commands.push(CoreCommand::DispatchWork(ready.work));
        }

        for (node, identifier) in ready.peer_tasks {
            self.plan.node_started(node);
            commands.push(CoreCommand::QueuePeerTask { node, identifier });
        }

        let completions = self.plan.take_completions();
        if !completions.is_empty() {
            commands.push(CoreCommand::ReportCompletions(completions));
        }

        let finished = self.plan.is_finished();
        if finished {
            commands.push(CoreCommand::RequestExit);
        }

        CoreStep {
            commands,
            keep_running: !finished,
        }
    }
}
