// tests/failure_and_skip.rs

//! Failure handling: dependents are skipped, unaffected siblings keep
//! running, and fail-fast cancels everything that has not started.

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use taskplan::cross_build::NoPeerBuilds;
use taskplan::engine::{
    CompletionOutcome, CoreScheduler, Runtime, RuntimeEvent, RuntimeOptions,
};
use taskplan::plan::{ExecutionPlan, PlanBuilder, TaskSpec};
use taskplan::types::CaseSensitivity;
use taskplan_test_utils::fake_executor::FakeExecutor;
use taskplan_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn plan_of(batches: Vec<Vec<TaskSpec>>) -> ExecutionPlan {
    let mut builder = PlanBuilder::new(CaseSensitivity::Sensitive);
    for batch in batches {
        builder
            .add_entry_batch(batch.into_iter().map(Into::into).collect())
            .unwrap();
    }
    builder.finish().unwrap()
}

#[tokio::test]
async fn failure_skips_dependents_but_siblings_run() -> TestResult {
    init_tracing();

    let plan = plan_of(vec![vec![
        TaskSpec::new(":broken").command("false"),
        TaskSpec::new(":dependent").command("echo dependent").after(":broken"),
        TaskSpec::new(":sibling").command("echo sibling"),
    ]]);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).fail_task(":broken");

    let core = CoreScheduler::new(plan, RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_rx, rt_tx.clone(), executor, Arc::new(NoPeerBuilds));

    let outcome = with_timeout(runtime.run()).await?;
    assert!(!outcome.is_success());
    assert!(!outcome.cancelled);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].node, ":broken");

    let ran = executed.lock().unwrap().clone();
    assert!(ran.contains(&":sibling".to_string()));
    assert!(!ran.contains(&":dependent".to_string()));

    let dependent = outcome
        .completions
        .iter()
        .find(|c| c.node == ":dependent")
        .expect("no completion for :dependent");
    assert_eq!(dependent.outcome, CompletionOutcome::Skipped);

    Ok(())
}

#[tokio::test]
async fn skip_propagates_through_whole_chain() -> TestResult {
    init_tracing();

    let plan = plan_of(vec![vec![
        TaskSpec::new(":broken").command("false"),
        TaskSpec::new(":middle").command("echo middle").after(":broken"),
        TaskSpec::new(":leaf").command("echo leaf").after(":middle"),
    ]]);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).fail_task(":broken");

    let core = CoreScheduler::new(plan, RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_rx, rt_tx.clone(), executor, Arc::new(NoPeerBuilds));

    let outcome = with_timeout(runtime.run()).await?;
    assert!(!outcome.is_success());

    let skipped: Vec<_> = outcome
        .completions
        .iter()
        .filter(|c| c.outcome == CompletionOutcome::Skipped)
        .map(|c| c.node.clone())
        .collect();
    assert_eq!(skipped, vec![":middle".to_string(), ":leaf".to_string()]);

    let ran = executed.lock().unwrap().clone();
    assert_eq!(ran, vec![":broken".to_string()]);

    Ok(())
}

#[tokio::test]
async fn fail_fast_cancels_pending_work() -> TestResult {
    init_tracing();

    let plan = plan_of(vec![vec![
        TaskSpec::new(":broken").command("false"),
        TaskSpec::new(":middle").command("echo middle").after(":broken"),
        TaskSpec::new(":leaf").command("echo leaf").after(":middle"),
    ]]);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).fail_task(":broken");

    let core = CoreScheduler::new(plan, RuntimeOptions { fail_fast: true });
    let runtime = Runtime::new(core, rt_rx, rt_tx.clone(), executor, Arc::new(NoPeerBuilds));

    let outcome = with_timeout(runtime.run()).await?;
    assert!(!outcome.is_success());
    assert!(outcome.cancelled);

    // Unstarted nodes are reported as not required, not as skipped.
    for node in [":middle", ":leaf"] {
        let completion = outcome
            .completions
            .iter()
            .find(|c| c.node == node)
            .unwrap_or_else(|| panic!("no completion for {node}"));
        assert_eq!(completion.outcome, CompletionOutcome::NotRequired);
    }

    Ok(())
}
