// crates/compliance-gate-core/src/runtime/parser.rs
// ============================================================================
// Module: Compliance Gate Result Parser
// Description: Converts captured command output into parsed values.
// Purpose: Apply the success/empty rule before any matcher sees output.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A non-zero exit always yields [`ParsedValue::Empty`], regardless of what
//! the command printed. A zero exit with whitespace-only stdout parses as JSON
//! `null`; anything else must be a single valid JSON document. Truncated
//! output is never parsed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::CommandResult;
use crate::core::ErrorKind;
use crate::core::EvaluationError;
use crate::core::ParsedValue;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Output parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Zero-exit stdout was not valid JSON.
    #[error("malformed command output: {0}")]
    MalformedOutput(String),
}

impl From<ParseError> for EvaluationError {
    fn from(value: ParseError) -> Self {
        Self::new(ErrorKind::MalformedOutput, value.to_string())
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Parses a command result into a structured value.
///
/// # Errors
///
/// Returns [`ParseError::MalformedOutput`] when a successful command printed invalid JSON.
pub fn parse_result(result: &CommandResult) -> Result<ParsedValue, ParseError> {
    if !result.succeeded() {
        return Ok(ParsedValue::Empty);
    }
    if result.stdout_truncated {
        return Err(ParseError::MalformedOutput(format!(
            "output truncated at {} bytes",
            result.stdout.len()
        )));
    }
    if result.stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParsedValue::Json(Value::Null));
    }
    serde_json::from_slice(&result.stdout)
        .map(ParsedValue::Json)
        .map_err(|err| ParseError::MalformedOutput(err.to_string()))
}
