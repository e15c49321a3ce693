// crates/compliance-gate-core/tests/audit.rs
// ============================================================================
// Module: Audit Sink Tests
// Description: JSON-line audit events and file sink behavior.
// ============================================================================
//! ## Overview
//! Audit events serialize to one JSON object per line and never include raw
//! command text unless it was supplied.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use compliance_gate_core::HashAlgorithm;
use compliance_gate_core::Outcome;
use compliance_gate_core::RunSummary;
use compliance_gate_core::hashing::hash_bytes;
use compliance_gate_core::runtime::AuditSink;
use compliance_gate_core::runtime::CommandAuditEvent;
use compliance_gate_core::runtime::FileAuditSink;
use compliance_gate_core::runtime::RunAuditEvent;
use compliance_gate_core::runtime::audit::CommandAuditEventParams;
use serde_json::Value;

fn command_event(command: Option<&str>) -> CommandAuditEvent {
    CommandAuditEvent::new(CommandAuditEventParams {
        command_digest: hash_bytes(HashAlgorithm::Sha256, b"gcloud describe"),
        command: command.map(ToString::to_string),
        examples: vec!["network/subnet".to_string()],
        exit_code: Some(0),
        timed_out: false,
        duration_ms: 12,
        stdout_bytes: 40,
        stderr_bytes: 0,
        error: None,
    })
}

#[test]
fn command_event_defaults_to_digest_only() {
    let payload = serde_json::to_value(command_event(None)).unwrap();
    assert_eq!(payload["event"], "command_executed");
    assert_eq!(payload["redaction"], "digest_only");
    assert_eq!(payload["command"], Value::Null);
    assert_eq!(payload["command_digest"]["algorithm"], "sha256");
    assert_eq!(payload["examples"][0], "network/subnet");

    let payload = serde_json::to_value(command_event(Some("gcloud describe"))).unwrap();
    assert_eq!(payload["redaction"], "command_text");
    assert_eq!(payload["command"], "gcloud describe");
}

#[test]
fn file_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let sink = FileAuditSink::new(&path).unwrap();
    sink.record_command(&command_event(None));
    sink.record_run(&RunAuditEvent::new(Outcome::Failed, RunSummary::default(), 1, 30, None));
    drop(sink);

    let reopened = FileAuditSink::new(&path).unwrap();
    reopened.record_command(&command_event(None));

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["event"], "run_completed");
    assert_eq!(lines[1]["outcome"], "failed");
    assert_eq!(lines[1]["distinct_commands"], 1);
    assert_eq!(lines[2]["event"], "command_executed");
}

#[test]
fn file_sink_reports_open_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing").join("audit.jsonl");
    assert!(FileAuditSink::new(&missing).is_err());
}
