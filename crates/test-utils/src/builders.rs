#![allow(dead_code)]

use std::collections::BTreeMap;

use taskplan::config::{BatchSection, ConfigSection, PlanFile, RawPlanFile, TaskConfig};

/// Builder for `PlanFile` to simplify test setup.
///
/// Each call to [`batch`](PlanFileBuilder::batch) opens a new entry batch;
/// tasks added afterwards land in that batch.
pub struct PlanFileBuilder {
    raw: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawPlanFile {
                config: ConfigSection::default(),
                batch: Vec::new(),
            },
        }
    }

    pub fn batch(mut self) -> Self {
        self.raw.batch.push(BatchSection {
            task: BTreeMap::new(),
        });
        self
    }

    pub fn with_task(mut self, path: &str, task: TaskConfig) -> Self {
        if self.raw.batch.is_empty() {
            self.raw.batch.push(BatchSection {
                task: BTreeMap::new(),
            });
        }
        let last = self.raw.batch.len() - 1;
        self.raw.batch[last].task.insert(path.to_string(), task);
        self
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.raw.config.max_workers = n;
        self
    }

    pub fn with_fail_fast(mut self, val: bool) -> Self {
        self.raw.config.fail_fast = val;
        self
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.raw).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                after: vec![],
                inputs: vec![],
                outputs: vec![],
                destroys: vec![],
                locks: vec![],
                project: None,
            },
        }
    }

    pub fn no_command() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn input(mut self, path: &str) -> Self {
        self.task.inputs.push(path.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.outputs.push(path.to_string());
        self
    }

    pub fn destroys(mut self, path: &str) -> Self {
        self.task.destroys.push(path.to_string());
        self
    }

    pub fn lock(mut self, name: &str) -> Self {
        self.task.locks.push(name.to_string());
        self
    }

    pub fn project(mut self, name: &str) -> Self {
        self.task.project = Some(name.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
