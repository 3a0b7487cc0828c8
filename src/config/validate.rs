// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{Result, TaskplanError};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::TaskplanError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.batch))
    }
}

fn validate_raw_plan(raw: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(raw)?;
    validate_global_config(raw)?;
    validate_task_dependencies(raw)?;
    validate_acyclic(raw)?;
    Ok(())
}

fn ensure_has_tasks(raw: &RawPlanFile) -> Result<()> {
    if raw.batch.iter().all(|batch| batch.task.is_empty()) {
        return Err(TaskplanError::ConfigError(
            "plan must contain at least one [batch.task.<path>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(raw: &RawPlanFile) -> Result<()> {
    if raw.config.max_workers == 0 {
        return Err(TaskplanError::ConfigError(
            "[config].max_workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// `after` may reference tasks in the same or any earlier batch, never a
/// later one. Duplicate paths across batches are also rejected here so the
/// plan builder sees unambiguous names.
fn validate_task_dependencies(raw: &RawPlanFile) -> Result<()> {
    let mut known: HashSet<&str> = HashSet::new();

    for batch in &raw.batch {
        for name in batch.task.keys() {
            if !known.insert(name.as_str()) {
                return Err(TaskplanError::ConfigError(format!(
                    "task '{}' is declared more than once",
                    name
                )));
            }
        }
        for (name, task) in batch.task.iter() {
            for dep in task.after.iter() {
                if dep == name {
                    return Err(TaskplanError::ConfigError(format!(
                        "task '{}' cannot depend on itself in `after`",
                        name
                    )));
                }
                if !known.contains(dep.as_str()) {
                    return Err(TaskplanError::ConfigError(format!(
                        "task '{}' has unknown dependency '{}' in `after` \
                         (dependencies must be in the same or an earlier batch)",
                        name, dep
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_acyclic(raw: &RawPlanFile) -> Result<()> {
    // Edge direction: dep -> task.
    // For:
    //   [batch.task.":b"]
    //   after = [":a"]
    // we add edge :a -> :b.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for batch in &raw.batch {
        for name in batch.task.keys() {
            graph.add_node(name.as_str());
        }
    }
    for batch in &raw.batch {
        for (name, task) in batch.task.iter() {
            for dep in task.after.iter() {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskplanError::PlanCycle(cycle.node_id().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::model::{PlanFile, RawPlanFile};

    fn parse(toml: &str) -> RawPlanFile {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn accepts_dependency_on_earlier_batch() {
        let raw = parse(
            r#"
            [[batch]]
            [batch.task.":a"]
            cmd = "true"

            [[batch]]
            [batch.task.":b"]
            cmd = "true"
            after = [":a"]
            "#,
        );
        assert!(PlanFile::try_from(raw).is_ok());
    }

    #[test]
    fn rejects_dependency_on_later_batch() {
        let raw = parse(
            r#"
            [[batch]]
            [batch.task.":a"]
            cmd = "true"
            after = [":b"]

            [[batch]]
            [batch.task.":b"]
            cmd = "true"
            "#,
        );
        assert!(PlanFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_self_dependency() {
        let raw = parse(
            r#"
            [[batch]]
            [batch.task.":a"]
            cmd = "true"
            after = [":a"]
            "#,
        );
        assert!(PlanFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_duplicate_task_paths() {
        let raw = parse(
            r#"
            [[batch]]
            [batch.task.":a"]
            cmd = "true"

            [[batch]]
            [batch.task.":a"]
            cmd = "true"
            "#,
        );
        assert!(PlanFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_empty_plan() {
        let raw = parse("[config]\nmax_workers = 2\n");
        assert!(PlanFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let raw = parse(
            r#"
            [config]
            max_workers = 0

            [[batch]]
            [batch.task.":a"]
            cmd = "true"
            "#,
        );
        assert!(PlanFile::try_from(raw).is_err());
    }

    #[test]
    fn cycle_within_batch_is_rejected() {
        let raw = parse(
            r#"
            [[batch]]
            [batch.task.":a"]
            cmd = "true"
            after = [":b"]
            [batch.task.":b"]
            cmd = "true"
            after = [":a"]
            "#,
        );
        // Both tasks are in the same batch, so the forward reference is
        // allowed by the dependency check and caught by the cycle check.
        assert!(PlanFile::try_from(raw).is_err());
    }
}
