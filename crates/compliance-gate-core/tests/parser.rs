// crates/compliance-gate-core/tests/parser.rs
// ============================================================================
// Module: Result Parser Tests
// Description: Exit-status aware parsing of command stdout.
// ============================================================================
//! ## Overview
//! Successful commands must print JSON; failing commands yield the empty
//! sentinel regardless of what they printed.

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

use std::time::Duration;

use compliance_gate_core::CommandResult;
use compliance_gate_core::ErrorKind;
use compliance_gate_core::EvaluationError;
use compliance_gate_core::ParseError;
use compliance_gate_core::ParsedValue;
use compliance_gate_core::runtime::parse_result;
use serde_json::Value;
use serde_json::json;

fn completed(exit_code: i32, stdout: &str) -> CommandResult {
    CommandResult::completed(exit_code, stdout.as_bytes().to_vec(), Vec::new(), Duration::from_millis(3))
}

#[test]
fn zero_exit_json_is_parsed() {
    let parsed = parse_result(&completed(0, r#"{"purpose": "PRIVATE", "tags": ["a"]}"#)).unwrap();
    assert_eq!(parsed, ParsedValue::Json(json!({ "purpose": "PRIVATE", "tags": ["a"] })));
    assert!(!parsed.is_empty());
}

#[test]
fn scalar_and_blank_output_are_values() {
    assert_eq!(parse_result(&completed(0, "42\n")).unwrap(), ParsedValue::Json(json!(42)));
    assert_eq!(parse_result(&completed(0, " \n\t")).unwrap(), ParsedValue::Json(Value::Null));
}

#[test]
fn nonzero_exit_yields_empty_even_with_json_output() {
    let parsed = parse_result(&completed(1, r#"{"purpose": "PRIVATE"}"#)).unwrap();
    assert_eq!(parsed, ParsedValue::Empty);
    assert!(parsed.as_json().is_none());
    assert_eq!(parse_result(&completed(127, "not json")).unwrap(), ParsedValue::Empty);
}

#[test]
fn timed_out_result_yields_empty() {
    let result = CommandResult::timed_out(Vec::new(), Duration::from_secs(1));
    assert_eq!(parse_result(&result).unwrap(), ParsedValue::Empty);
}

#[test]
fn malformed_zero_exit_output_is_an_error() {
    let err = parse_result(&completed(0, "Listed 0 items.")).unwrap_err();
    assert!(matches!(err, ParseError::MalformedOutput(_)));
    let evaluation: EvaluationError = err.into();
    assert_eq!(evaluation.kind, ErrorKind::MalformedOutput);
}

#[test]
fn truncated_output_is_not_parsed() {
    let mut result = completed(0, "[1, 2");
    result.stdout_truncated = true;
    let err = parse_result(&result).unwrap_err();
    assert_eq!(err, ParseError::MalformedOutput("output truncated at 5 bytes".to_string()));
}

#[test]
fn truncated_stderr_does_not_affect_stdout_parsing() {
    let mut result = completed(0, r#"{"purpose":"PRIVATE"}"#);
    result.stderr = vec![b'w'; 1024];
    result.stderr_truncated = true;
    assert_eq!(parse_result(&result).unwrap(), ParsedValue::Json(json!({ "purpose": "PRIVATE" })));
}
