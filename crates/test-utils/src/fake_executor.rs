use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use taskplan::engine::{RuntimeEvent, WorkOutcome};
use taskplan::errors::Result;
use taskplan::exec::ExecutorBackend;
use taskplan::plan::ScheduledWork;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which nodes were "run" (in dispatch order)
/// - immediately reports NodeCompleted for each dispatched node, with
///   Success unless the node path was registered via [`fail_task`].
///
/// [`fail_task`]: FakeExecutor::fail_task
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    fail: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            fail: HashSet::new(),
        }
    }

    /// Make the executor report failure (exit code 1) for this task path.
    pub fn fail_task(mut self, path: &str) -> Self {
        self.fail.insert(path.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn dispatch(
        &mut self,
        work: Vec<ScheduledWork>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let fail = self.fail.clone();

        Box::pin(async move {
            for item in work {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(item.path.clone());
                }

                let outcome = if fail.contains(&item.path) {
                    WorkOutcome::Failed(1)
                } else {
                    WorkOutcome::Success
                };

                tx.send(RuntimeEvent::NodeCompleted {
                    node: item.node,
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// An executor that records dispatches but never completes anything.
///
/// Useful for cancellation tests: dispatched nodes stay "executing" until
/// the test completes them by hand through the runtime event channel.
pub struct StalledExecutor {
    executed: Arc<Mutex<Vec<ScheduledWork>>>,
}

impl StalledExecutor {
    pub fn new(executed: Arc<Mutex<Vec<ScheduledWork>>>) -> Self {
        Self { executed }
    }
}

impl ExecutorBackend for StalledExecutor {
    fn dispatch(
        &mut self,
        work: Vec<ScheduledWork>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            let mut guard = executed.lock().unwrap();
            guard.extend(work);
            Ok(())
        })
    }
}
