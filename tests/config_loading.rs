// tests/config_loading.rs

//! Loading and validating plan files from disk.

use std::error::Error;
use std::fs;

use taskplan::config::{load_and_validate, load_from_path};
use taskplan_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const SAMPLE_PLAN: &str = r#"
[config]
max_workers = 2
fail_fast = true

[[batch]]
[batch.task.":clean"]
cmd = "rm -rf build"
destroys = ["build"]

[[batch]]
[batch.task.":compile"]
cmd = "cc -o build/app main.c"
inputs = ["main.c"]
outputs = ["build/app"]

[batch.task.":lint"]
cmd = "cc -fsyntax-only main.c"
inputs = ["main.c"]
locks = ["cc"]
"#;

#[test]
fn loads_and_validates_sample_plan() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Taskplan.toml");
    fs::write(&path, SAMPLE_PLAN)?;

    let plan = load_and_validate(&path)?;
    assert_eq!(plan.config.max_workers, 2);
    assert!(plan.config.fail_fast);
    assert!(!plan.config.case_insensitive_paths);

    let batches = plan.to_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[1].len(), 2);

    Ok(())
}

#[test]
fn validated_plan_builds_an_execution_plan() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Taskplan.toml");
    fs::write(&path, SAMPLE_PLAN)?;

    let plan_file = load_and_validate(&path)?;

    use taskplan::plan::PlanBuilder;
    use taskplan::types::CaseSensitivity;

    let mut builder = PlanBuilder::new(CaseSensitivity::Sensitive);
    for batch in plan_file.to_batches() {
        builder.add_entry_batch(batch)?;
    }
    let plan = builder.finish()?;

    assert!(plan.find_task(":clean").is_some());
    assert!(plan.find_task(":compile").is_some());
    assert!(plan.find_task(":lint").is_some());

    // :compile produces under build/, which :clean destroys, so the overlap
    // edge must be present without any explicit `after`.
    let clean = plan.find_task(":clean").unwrap();
    let compile = plan.find_task(":compile").unwrap();
    assert!(plan.node(compile).dependencies().contains(&clean));

    Ok(())
}

#[test]
fn raw_load_accepts_what_validation_rejects() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Taskplan.toml");
    fs::write(
        &path,
        r#"
        [[batch]]
        [batch.task.":a"]
        cmd = "true"
        after = [":missing"]
        "#,
    )?;

    // Deserialization alone succeeds; validation catches the bad reference.
    assert!(load_from_path(&path).is_ok());
    assert!(load_and_validate(&path).is_err());

    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    init_tracing();

    let err = load_from_path("/nonexistent/Taskplan.toml").unwrap_err();
    assert!(matches!(err, taskplan::errors::TaskplanError::IoError(_)));
}
