// tests/ordinal_ordering.rs

//! Batch-order guarantees between destroyers and producers that touch
//! overlapping filesystem locations, with no explicit dependencies.

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use taskplan::cross_build::NoPeerBuilds;
use taskplan::engine::{CoreScheduler, Runtime, RuntimeEvent, RuntimeOptions};
use taskplan::plan::{ExecutionPlan, NodeSpec, PlanBuilder};
use taskplan::types::CaseSensitivity;
use taskplan_test_utils::fake_executor::FakeExecutor;
use taskplan_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn run_to_completion(plan: ExecutionPlan) -> (taskplan::plan::PlanOutcome, Vec<String>) {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    let core = CoreScheduler::new(plan, RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_rx, rt_tx.clone(), executor, Arc::new(NoPeerBuilds));

    let outcome = with_timeout(runtime.run()).await.expect("runtime failed");
    let ran = executed.lock().unwrap().clone();
    (outcome, ran)
}

fn batches(specs: Vec<Vec<NodeSpec>>) -> ExecutionPlan {
    let mut builder = PlanBuilder::new(CaseSensitivity::Sensitive);
    for batch in specs {
        builder.add_entry_batch(batch).unwrap();
    }
    builder.finish().unwrap()
}

fn index_of(ran: &[String], path: &str) -> usize {
    ran.iter()
        .position(|p| p == path)
        .unwrap_or_else(|| panic!("{path} did not run; ran: {ran:?}"))
}

#[tokio::test]
async fn clean_requested_first_runs_before_producer_of_same_location() -> TestResult {
    init_tracing();

    use taskplan::plan::TaskSpec;
    let plan = batches(vec![
        vec![TaskSpec::new(":clean")
            .command("rm -rf build")
            .destroys("build")
            .into()],
        vec![TaskSpec::new(":assemble")
            .command("make assemble")
            .output("build/libs")
            .into()],
    ]);

    let (outcome, ran) = run_to_completion(plan).await;
    assert!(outcome.is_success());
    assert!(index_of(&ran, ":clean") < index_of(&ran, ":assemble"));

    Ok(())
}

#[tokio::test]
async fn producer_requested_first_runs_before_later_destroyer() -> TestResult {
    init_tracing();

    use taskplan::plan::TaskSpec;
    let plan = batches(vec![
        vec![TaskSpec::new(":assemble")
            .command("make assemble")
            .output("build/libs")
            .into()],
        vec![TaskSpec::new(":clean")
            .command("rm -rf build")
            .destroys("build")
            .into()],
    ]);

    let (outcome, ran) = run_to_completion(plan).await;
    assert!(outcome.is_success());
    assert!(index_of(&ran, ":assemble") < index_of(&ran, ":clean"));

    Ok(())
}

#[tokio::test]
async fn unrelated_tasks_are_not_ordered_by_anchors() -> TestResult {
    init_tracing();

    // ":docs" touches nothing under build/, so the clean/assemble ordering
    // must not hold it back: it is dispatched in the very first sweep.
    use taskplan::plan::TaskSpec;
    let plan = batches(vec![
        vec![TaskSpec::new(":clean")
            .command("rm -rf build")
            .destroys("build")
            .into()],
        vec![
            TaskSpec::new(":assemble")
                .command("make assemble")
                .output("build/libs")
                .into(),
            TaskSpec::new(":docs").command("make docs").into(),
        ],
    ]);

    let (outcome, ran) = run_to_completion(plan).await;
    assert!(outcome.is_success());
    assert_eq!(ran.len(), 3);
    // First dispatch wave contains both :clean and :docs.
    assert!(index_of(&ran, ":docs") < index_of(&ran, ":assemble"));

    Ok(())
}
