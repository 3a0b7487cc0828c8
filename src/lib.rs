// src/lib.rs

pub mod cli;
pub mod config;
pub mod cross_build;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::cross_build::NoPeerBuilds;
use crate::engine::{
    CompletionOutcome, CoreScheduler, NodeCompletion, Runtime, RuntimeEvent, RuntimeOptions,
};
use crate::exec::{ProcessExecutorBackend, ResourceLockRegistry};
use crate::plan::PlanBuilder;
use crate::types::CaseSensitivity;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan-file loading
/// - plan builder / core scheduler / runtime
/// - executor worker pool
/// - completion reporting
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let plan_file = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&plan_file);
        return Ok(());
    }

    let case_sensitivity = if plan_file.config.case_insensitive_paths {
        CaseSensitivity::Insensitive
    } else {
        CaseSensitivity::Sensitive
    };

    // Assemble the execution plan, one ordinal group per [[batch]].
    let mut builder = PlanBuilder::new(case_sensitivity);
    for batch in plan_file.to_batches() {
        builder.add_entry_batch(batch)?;
    }
    let plan = builder.finish()?;

    let max_workers = args.max_workers.unwrap_or(plan_file.config.max_workers);
    let options = RuntimeOptions {
        fail_fast: args.fail_fast || plan_file.config.fail_fast,
    };

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Process executor backend with shared resource locks.
    let executor = ProcessExecutorBackend::new(rt_tx.clone(), ResourceLockRegistry::new(), max_workers);

    // Completion report stream, consumed by a logging task.
    let (report_tx, report_rx) = mpsc::channel::<NodeCompletion>(64);
    let reporter = tokio::spawn(consume_reports(report_rx));

    // Ctrl-C → cancel: nothing new starts, in-flight work finishes.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::CancelRequested).await;
        });
    }

    // Construct the pure core (single source of truth for semantics) and
    // the async IO shell around it.
    let core = CoreScheduler::new(plan, options);
    let runtime = Runtime::new(core, rt_rx, rt_tx.clone(), executor, Arc::new(NoPeerBuilds))
        .with_report_sink(report_tx);

    let outcome = runtime.run().await?;
    let _ = reporter.await;

    if outcome.cancelled {
        info!("plan was cancelled before all nodes ran");
    }
    if !outcome.is_success() {
        for failure in &outcome.failures {
            error!(node = %failure.node, cause = %failure.cause, "node failed");
        }
        return Err(anyhow!("{} node(s) failed", outcome.failures.len()));
    }

    info!("all nodes completed successfully");
    Ok(())
}

/// Log each node completion as it arrives.
async fn consume_reports(mut rx: mpsc::Receiver<NodeCompletion>) {
    while let Some(completion) = rx.recv().await {
        match completion.outcome {
            CompletionOutcome::Succeeded => {
                info!(node = %completion.node, "node succeeded");
            }
            CompletionOutcome::Failed => {
                let cause = completion.failure.as_deref().unwrap_or("unknown failure");
                error!(node = %completion.node, %cause, "node failed");
            }
            CompletionOutcome::Skipped => {
                warn!(node = %completion.node, "node skipped (dependency did not succeed)");
            }
            CompletionOutcome::NotRequired => {
                info!(node = %completion.node, "node not required (plan cancelled)");
            }
        }
    }
}

/// Simple dry-run output: print batches, tasks, deps and declared accesses.
fn print_dry_run(plan_file: &PlanFile) {
    println!("taskplan dry-run");
    println!("  config.max_workers = {}", plan_file.config.max_workers);
    println!("  config.fail_fast = {}", plan_file.config.fail_fast);
    println!(
        "  config.case_insensitive_paths = {}",
        plan_file.config.case_insensitive_paths
    );
    println!();

    for (ordinal, batch) in plan_file.batches.iter().enumerate() {
        println!("batch {} ({} tasks):", ordinal, batch.task.len());
        for (path, task) in batch.task.iter() {
            println!("  - {path}");
            if let Some(ref cmd) = task.cmd {
                println!("      cmd: {cmd}");
            }
            if !task.after.is_empty() {
                println!("      after: {:?}", task.after);
            }
            if !task.inputs.is_empty() {
                println!("      inputs: {:?}", task.inputs);
            }
            if !task.outputs.is_empty() {
                println!("      outputs: {:?}", task.outputs);
            }
            if !task.destroys.is_empty() {
                println!("      destroys: {:?}", task.destroys);
            }
            if !task.locks.is_empty() {
                println!("      locks: {:?}", task.locks);
            }
            if let Some(ref project) = task.project {
                println!("      project: {project}");
            }
        }
    }
}
