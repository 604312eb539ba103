//! Script loading and replay tests
//!
//! Scripts are written to a temporary directory and loaded back the same way
//! the command-line driver does.

use range_indexer::{AllocatorConfig, IndexerError, MergeCase, Outcome, Script, Snapshot, Span, Step};
use std::fs;
use tempfile::TempDir;

const SCRIPT: &str = r#"
verify = true

[allocator]
start = 100
length = 20

[[step]]
op = "alloc"
length = 5

[[step]]
op = "alloc"
length = 5

[[step]]
op = "dealloc"
start = 100

[[step]]
op = "dealloc"
start = 105
"#;

#[test]
fn test_load_and_run_script_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("walk.toml");
    fs::write(&path, SCRIPT).unwrap();

    let script = Script::load(&path).unwrap();
    assert!(script.verify);
    assert_eq!(script.allocator, AllocatorConfig { start: 100, length: 20 });
    assert_eq!(script.steps.len(), 4);
    assert_eq!(script.steps[3], Step::Dealloc { start: 105 });

    let run = script.run().unwrap();
    let outcomes: Vec<&Outcome> = run.steps.iter().map(|report| &report.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            &Outcome::Allocated { start: 100 },
            &Outcome::Allocated { start: 105 },
            &Outcome::Freed { merge: MergeCase::Standalone },
            &Outcome::Freed { merge: MergeCase::Both },
        ]
    );
    assert_eq!(run.final_snapshot().free_spans(), &[Span { start: 100, end: 119 }]);
}

#[test]
fn test_missing_script_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = Script::load(temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(IndexerError::Io(_))));
}

#[test]
fn test_malformed_script_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");

    fs::write(&path, "[allocator]\nstart = \"one\"\n").unwrap();
    assert!(matches!(Script::load(&path), Err(IndexerError::Config(_))));

    fs::write(&path, "[allocator]\nstart = 1\nwidth = 5\n").unwrap();
    assert!(matches!(Script::load(&path), Err(IndexerError::Config(_))));

    fs::write(&path, "[[step]]\nop = \"alloc\"\n").unwrap();
    assert!(matches!(Script::load(&path), Err(IndexerError::Config(_))));
}

#[test]
fn test_partial_allocator_section_uses_defaults() {
    let script = Script::from_toml_str("[allocator]\nlength = 8\n").unwrap();
    assert_eq!(script.allocator, AllocatorConfig { start: 1, length: 8 });
    assert!(script.steps.is_empty());
}

#[test]
fn test_invalid_domain_aborts_run() {
    let script = Script::from_toml_str("[allocator]\nstart = 1\nlength = 0\n").unwrap();
    assert!(matches!(script.run(), Err(IndexerError::InvalidArgument(_))));
}

#[test]
fn test_overridden_domain() {
    let mut script = Script::demo();
    script.allocator = AllocatorConfig { start: 1, length: 50 };

    // The tail of the walkthrough no longer fits and is recorded as failures
    let run = script.run().unwrap();
    assert_eq!(run.steps.len(), script.steps.len());
    assert!(run
        .steps
        .iter()
        .any(|report| matches!(report.outcome, Outcome::Failed { .. })));
    assert_eq!(run.initial.domain, Span { start: 1, end: 50 });
}

#[test]
fn test_run_serializes_to_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("final.json");

    let run = Script::demo().run().unwrap();
    let snapshot = run.final_snapshot();
    fs::write(&path, snapshot.to_json().unwrap()).unwrap();

    let restored: Snapshot = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(&restored, snapshot);

    let value = serde_json::to_value(&run).unwrap();
    assert_eq!(value["steps"][0]["step"]["op"], "alloc");
    assert_eq!(value["steps"][0]["outcome"]["result"], "allocated");
    assert_eq!(value["steps"][15]["outcome"]["merge"], "both");
}
