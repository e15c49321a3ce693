// crates/compliance-gate-core/src/core/value.rs
// ============================================================================
// Module: Compliance Gate Parsed Values
// Description: Parsed command output with an explicit empty sentinel.
// Purpose: Distinguish "command did not succeed" from any real JSON value.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`ParsedValue::Empty`] is produced when a command exits non-zero. It is
//! distinct from JSON `null` and from empty collections, and matchers never
//! receive it: expectations that read stdout of a failed command are errored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Parsed Value
// ============================================================================

/// Structured view of a command's stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParsedValue {
    /// The command did not succeed; no output is available.
    Empty,
    /// Parsed JSON output.
    Json(Value),
}

impl ParsedValue {
    /// Returns the JSON value when output is available.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Empty => None,
        }
    }

    /// Returns true for the empty sentinel.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
