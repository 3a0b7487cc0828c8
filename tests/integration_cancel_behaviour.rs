// tests/integration_cancel_behaviour.rs

//! Cancellation: in-flight nodes run to completion, unstarted nodes are
//! reported as not required.

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use taskplan::cross_build::NoPeerBuilds;
use taskplan::engine::{
    CompletionOutcome, CoreScheduler, Runtime, RuntimeEvent, RuntimeOptions, WorkOutcome,
};
use taskplan::plan::{PlanBuilder, ScheduledWork, TaskSpec};
use taskplan::types::CaseSensitivity;
use taskplan_test_utils::fake_executor::StalledExecutor;
use taskplan_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn cancel_lets_inflight_finish_and_drops_the_rest() -> TestResult {
    init_tracing();

    let mut builder = PlanBuilder::new(CaseSensitivity::Sensitive);
    builder
        .add_entry_batch(vec![
            TaskSpec::new(":slow").command("sleep 60").into(),
            TaskSpec::new(":next").command("echo next").after(":slow").into(),
        ])
        .unwrap();
    let plan = builder.finish().unwrap();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let dispatched: Arc<Mutex<Vec<ScheduledWork>>> = Arc::new(Mutex::new(Vec::new()));
    let executor = StalledExecutor::new(dispatched.clone());

    let core = CoreScheduler::new(plan, RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_rx, rt_tx.clone(), executor, Arc::new(NoPeerBuilds));
    let handle = tokio::spawn(runtime.run());

    // Wait for :slow to be dispatched.
    let slow = loop {
        if let Some(work) = dispatched.lock().unwrap().first().cloned() {
            break work;
        }
        sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(slow.path, ":slow");

    // Cancel while :slow is executing, then let it finish.
    rt_tx.send(RuntimeEvent::CancelRequested).await?;
    rt_tx
        .send(RuntimeEvent::NodeCompleted {
            node: slow.node,
            outcome: WorkOutcome::Success,
        })
        .await?;

    let outcome = with_timeout(async { handle.await.unwrap() }).await?;
    assert!(outcome.cancelled);
    assert!(!outcome.is_success());

    // :slow finished normally; :next never started.
    let slow_completion = outcome
        .completions
        .iter()
        .find(|c| c.node == ":slow")
        .expect("no completion for :slow");
    assert_eq!(slow_completion.outcome, CompletionOutcome::Succeeded);

    let next_completion = outcome
        .completions
        .iter()
        .find(|c| c.node == ":next")
        .expect("no completion for :next");
    assert_eq!(next_completion.outcome, CompletionOutcome::NotRequired);

    assert_eq!(dispatched.lock().unwrap().len(), 1);

    Ok(())
}
