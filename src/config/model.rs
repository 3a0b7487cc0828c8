// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::plan::{NodeSpec, TaskSpec};

/// Top-level plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// max_workers = 4
/// fail_fast = false
///
/// [[batch]]
/// [batch.task.":clean"]
/// cmd = "rm -rf build"
/// destroys = ["build"]
///
/// [[batch]]
/// [batch.task.":compile"]
/// cmd = "cc -o build/app main.c"
/// outputs = ["build/app"]
/// ```
///
/// Each `[[batch]]` entry becomes one ordinal group: tasks in a later batch
/// that touch the same locations as tasks in an earlier batch run after them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Ordered entry batches from `[[batch]]`.
    #[serde(default)]
    pub batch: Vec<BatchSection>,
}

/// One `[[batch]]` section: a set of tasks requested together.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BatchSection {
    /// All tasks from `[batch.task.<path>]`, keyed by task path.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of node processes running at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Cancel all remaining work on the first failure instead of only
    /// skipping dependents.
    #[serde(default)]
    pub fail_fast: bool,

    /// Compare filesystem locations case-insensitively.
    #[serde(default)]
    pub case_insensitive_paths: bool,
}

fn default_max_workers() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            fail_fast: false,
            case_insensitive_paths: false,
        }
    }
}

/// `[batch.task.<path>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// The command to execute. Tasks without a command are ordering-only.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Dependency list: this task waits for all tasks listed here.
    ///
    /// References may name tasks in the same or any earlier batch.
    #[serde(default)]
    pub after: Vec<String>,

    /// Filesystem locations this task reads.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Filesystem locations this task produces.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Filesystem locations this task deletes.
    #[serde(default)]
    pub destroys: Vec<String>,

    /// Named resource locks held while the command runs.
    #[serde(default)]
    pub locks: Vec<String>,

    /// Project this task belongs to; scopes its input registrations.
    #[serde(default)]
    pub project: Option<String>,
}

/// A plan file that has passed validation.
///
/// Constructed through `TryFrom<RawPlanFile>` in `validate.rs`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub batches: Vec<BatchSection>,
}

impl PlanFile {
    /// Only `validate.rs` should call this, after checks have passed.
    pub(crate) fn new_unchecked(config: ConfigSection, batches: Vec<BatchSection>) -> Self {
        Self { config, batches }
    }

    /// Convert the validated file into node specs, one `Vec` per entry batch.
    pub fn to_batches(&self) -> Vec<Vec<NodeSpec>> {
        self.batches
            .iter()
            .map(|batch| {
                batch
                    .task
                    .iter()
                    .map(|(path, task)| {
                        let mut spec = TaskSpec::new(path.clone());
                        if let Some(cmd) = &task.cmd {
                            spec = spec.command(cmd.clone());
                        }
                        for dep in &task.after {
                            spec = spec.after(dep.clone());
                        }
                        for input in &task.inputs {
                            spec = spec.input(input.clone());
                        }
                        for output in &task.outputs {
                            spec = spec.output(output.clone());
                        }
                        for destroyed in &task.destroys {
                            spec = spec.destroys(destroyed.clone());
                        }
                        for lock in &task.locks {
                            spec = spec.lock(lock.clone());
                        }
                        if let Some(project) = &task.project {
                            spec = spec.project(project.clone());
                        }
                        NodeSpec::from(spec)
                    })
                    .collect()
            })
            .collect()
    }
}
