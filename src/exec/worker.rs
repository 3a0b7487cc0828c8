// src/exec/worker.rs

//! Worker pool that runs node commands as OS processes.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};

use crate::engine::{RuntimeEvent, WorkOutcome};
use crate::plan::ScheduledWork;

use super::locks::ResourceLockRegistry;

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ScheduledWork>` is what the runtime (or
/// `ProcessExecutorBackend`) dispatches through. Each scheduled node runs in
/// its own Tokio task; at most `max_workers` node processes run at once, and
/// each worker holds the node's resource locks while its process runs.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    locks: ResourceLockRegistry,
    max_workers: usize,
) -> mpsc::Sender<ScheduledWork> {
    let (tx, mut rx) = mpsc::channel::<ScheduledWork>(32);
    let permits = Arc::new(Semaphore::new(max_workers.max(1)));

    tokio::spawn(async move {
        info!(max_workers, "executor loop started");

        while let Some(work) = rx.recv().await {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let rt_tx = runtime_tx.clone();
            let locks = locks.clone();

            tokio::spawn(async move {
                run_work(work, rt_tx, locks).await;
                drop(permit);
            });
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Run a single node's command and emit `NodeCompleted` when it is done.
async fn run_work(
    work: ScheduledWork,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    locks: ResourceLockRegistry,
) {
    let node = work.node;
    let path = work.path.clone();

    let outcome = match run_work_inner(work, locks).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(task = %path, error = %err, "task execution error");
            WorkOutcome::Failed(-1)
        }
    };

    if runtime_tx
        .send(RuntimeEvent::NodeCompleted { node, outcome })
        .await
        .is_err()
    {
        debug!(task = %path, "runtime event channel closed; completion not reported");
    }
}

async fn run_work_inner(
    work: ScheduledWork,
    locks: ResourceLockRegistry,
) -> Result<WorkOutcome> {
    // Held for the whole process lifetime, released on return.
    let _guards = locks.acquire_all(&work.locks).await;

    let Some(command) = work.command else {
        debug!(task = %work.path, "node has no command; completing immediately");
        return Ok(WorkOutcome::Success);
    };

    info!(
        task = %work.path,
        cmd = %command,
        ordinal = work.ordinal,
        "starting task process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&command);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", work.path))?;

    // Always consume both pipes so buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        let task_name = work.path.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let task_name = work.path.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{}'", work.path))?;

    let code = status.code().unwrap_or(-1);
    info!(
        task = %work.path,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if status.success() {
        Ok(WorkOutcome::Success)
    } else {
        Ok(WorkOutcome::Failed(code))
    }
}
