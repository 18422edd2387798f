//! Integration test: structured logging contract
//!
//! Validates that:
//! 1. LogEmitter writes schema-valid JSONL to files.
//! 2. validate_log_file reports violations with their line numbers.
//! 3. ArtifactIndex serializes with its digests and reloads unchanged.
//!
//! Run: cargo test -p trippin-harness --test structured_log_test

use trippin_harness::Expectation;
use trippin_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file,
};

#[test]
fn emitter_writes_valid_jsonl_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harness.log.jsonl");

    let mut emitter = LogEmitter::to_file(&path, "trippin-harness", "run-7").unwrap();
    emitter
        .emit_entry(LogEntry::event(LogLevel::Info, "harness.start"))
        .unwrap();
    emitter
        .emit_entry(
            LogEntry::event(LogLevel::Info, "case.verdict")
                .with_case("test/buffer.cpp", Expectation::CompileAndRunSucceed)
                .with_outcome(Outcome::Pass)
                .with_duration_ms(42),
        )
        .unwrap();
    emitter
        .emit_entry(
            LogEntry::event(LogLevel::Error, "case.run")
                .with_case("test/buffer_overflow.cpp", Expectation::CompileAndRunFail)
                .with_command("./test/buffer_overflow")
                .with_exit_code(134),
        )
        .unwrap();
    emitter.flush().unwrap();
    drop(emitter);

    let (lines, errors) = validate_log_file(&path).unwrap();
    assert_eq!(lines, 3);
    assert!(errors.is_empty(), "{errors:?}");

    let content = std::fs::read_to_string(&path).unwrap();
    let traces: Vec<String> = content
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["trace_id"].to_string())
        .collect();
    assert_eq!(
        traces,
        [
            "\"trippin-harness::run-7::001\"",
            "\"trippin-harness::run-7::002\"",
            "\"trippin-harness::run-7::003\"",
        ]
    );
}

#[test]
fn file_validation_reports_offending_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.log.jsonl");
    let good = LogEntry::new("c::r::001", LogLevel::Info, "harness.start")
        .to_jsonl()
        .unwrap();
    let content = format!(
        "{good}\n\n{{\"timestamp\":\"x\",\"trace_id\":\"c::r::002\",\"level\":\"loud\",\"event\":\"e\"}}\nnot json\n"
    );
    std::fs::write(&path, content).unwrap();

    let (lines, errors) = validate_log_file(&path).unwrap();
    assert_eq!(lines, 3, "blank lines are not counted");
    let flagged: Vec<_> = errors.iter().map(|e| (e.line_number, e.field.as_str())).collect();
    assert_eq!(flagged, [(3, "level"), (4, "<json>")]);
}

#[test]
fn artifact_index_reloads_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let binary = dir.path().join("memory");
    std::fs::write(&binary, b"\x7fELF").unwrap();

    let mut index = ArtifactIndex::new("run-7", "trippin-harness");
    index.add_file(&binary, "binary").unwrap();
    let json = index.to_json().unwrap();

    let reloaded: ArtifactIndex = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded.index_version, 1);
    assert_eq!(reloaded.run_id, "run-7");
    assert_eq!(reloaded.artifacts.len(), 1);
    assert_eq!(reloaded.artifacts[0].size_bytes, Some(4));
    assert_eq!(reloaded.artifacts[0].sha256.len(), 64);
    assert_eq!(reloaded.artifacts[0].sha256, index.artifacts[0].sha256);
}
