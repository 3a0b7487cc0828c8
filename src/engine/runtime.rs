// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cross_build::PeerBuildController;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::plan::{PlanOutcome, ScheduledWork};

use super::core::CoreScheduler;
use super::{CoreCommand, NodeCompletion, RuntimeEvent};

/// Drives the execution plan in response to `RuntimeEvent`s, and delegates
/// actual command execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreScheduler`, which contains all the
/// scheduling semantics. This struct handles async IO: reading events from
/// channels, dispatching work to the executor, handing cross-build nodes to
/// their peer build, and forwarding completion records to the report sink.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreScheduler,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    /// Cloned into peer builds so their state changes flow back to us.
    event_tx: mpsc::Sender<RuntimeEvent>,
    executor: E,
    peers: Arc<dyn PeerBuildController>,
    report_tx: Option<mpsc::Sender<NodeCompletion>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreScheduler,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        executor: E,
        peers: Arc<dyn PeerBuildController>,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            peers,
            report_tx: None,
        }
    }

    /// Attach a sink for the node-completion event stream.
    pub fn with_report_sink(mut self, report_tx: mpsc::Sender<NodeCompletion>) -> Self {
        self.report_tx = Some(report_tx);
        self
    }

    /// Main event loop.
    ///
    /// - Performs the initial sweep to dispatch root nodes.
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core scheduler.
    /// - Executes commands returned by the core (dispatch work, queue peer
    ///   tasks, report completions, exit).
    pub async fn run(mut self) -> Result<PlanOutcome> {
        info!("taskplan runtime started");

        let step = self.core.start();
        let mut keep_running = true;
        for command in step.commands {
            self.execute_command(command).await?;
        }
        if !step.keep_running {
            keep_running = false;
        }

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            // Execute the commands.
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                keep_running = false;
            }
        }

        info!("runtime exiting");
        Ok(self.core.into_outcome())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchWork(work) => {
                self.dispatch_ready(work).await?;
            }
            CoreCommand::QueuePeerTask { node, identifier } => {
                debug!(peer = %identifier, "queueing task on peer build");
                let handle = self.peers.locate_task(&identifier)?;
                // Queueing must never block this build's event loop; the
                // peer build reports back through the event channel.
                handle.queue_for_execution(node, self.event_tx.clone());
            }
            CoreCommand::ReportCompletions(completions) => {
                self.report(completions).await;
            }
            CoreCommand::RequestExit => {
                // The core already returns keep_running=false in this case,
                // so this command is somewhat redundant. We'll just log it.
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn dispatch_ready(&mut self, work: Vec<ScheduledWork>) -> Result<()> {
        if work.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = work.iter().map(|w| w.path.as_str()).collect();
        debug!(?names, "dispatching ready nodes");

        self.executor.dispatch(work).await
    }

    async fn report(&mut self, completions: Vec<NodeCompletion>) {
        let Some(tx) = self.report_tx.clone() else {
            return;
        };
        for completion in completions {
            if tx.send(completion).await.is_err() {
                debug!("report sink closed; dropping remaining completions");
                self.report_tx = None;
                return;
            }
        }
    }
}
