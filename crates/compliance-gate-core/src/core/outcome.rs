// crates/compliance-gate-core/src/core/outcome.rs
// ============================================================================
// Module: Compliance Gate Outcomes
// Description: Outcome roll-up, node lifecycle states, and evaluation errors.
// Purpose: Give every assertion node a deterministic terminal result.
// Dependencies: crate::core::attributes, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Outcomes roll up bottom-up with precedence `Errored > Failed > Passed`.
//! A node with no children passes. Nodes move through
//! `Pending -> Evaluating -> {Passed, Failed, Errored}` and never leave a
//! terminal state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::attributes::AttributeError;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Terminal outcome of an assertion node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every check held.
    Passed,
    /// At least one check did not hold and none errored.
    Failed,
    /// At least one check could not be evaluated.
    Errored,
}

impl Outcome {
    /// Combines two outcomes using roll-up precedence.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Errored, _) | (_, Self::Errored) => Self::Errored,
            (Self::Failed, _) | (_, Self::Failed) => Self::Failed,
            (Self::Passed, Self::Passed) => Self::Passed,
        }
    }

    /// Rolls up child outcomes; an empty set passes.
    #[must_use]
    pub fn aggregate<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        outcomes.into_iter().fold(Self::Passed, Self::combine)
    }

    /// Returns the stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Node State
// ============================================================================

/// Lifecycle state of an assertion node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Not yet evaluated.
    #[default]
    Pending,
    /// Evaluation in progress.
    Evaluating,
    /// Terminal: passed.
    Passed,
    /// Terminal: failed.
    Failed,
    /// Terminal: errored.
    Errored,
}

impl NodeState {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Errored)
    }

    /// Returns the terminal outcome, if any.
    #[must_use]
    pub const fn outcome(self) -> Option<Outcome> {
        match self {
            Self::Passed => Some(Outcome::Passed),
            Self::Failed => Some(Outcome::Failed),
            Self::Errored => Some(Outcome::Errored),
            Self::Pending | Self::Evaluating => None,
        }
    }

    /// Applies a checked transition.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the transition is not permitted.
    pub const fn transition(self, next: Self) -> Result<Self, StateError> {
        match (self, next) {
            // Expansion failures resolve a pending node straight to errored.
            (Self::Pending, Self::Evaluating | Self::Errored)
            | (Self::Evaluating, Self::Passed | Self::Failed | Self::Errored) => Ok(next),
            (from, to) => Err(StateError {
                from,
                to,
            }),
        }
    }

    /// Moves from `Pending` to `Evaluating`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the node is not pending.
    pub const fn begin(self) -> Result<Self, StateError> {
        self.transition(Self::Evaluating)
    }

    /// Moves from `Evaluating` to the terminal state for `outcome`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the node is not evaluating.
    pub const fn finish(self, outcome: Outcome) -> Result<Self, StateError> {
        self.transition(Self::from_outcome(outcome))
    }

    /// Returns the stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Evaluating => "evaluating",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
        }
    }

    /// Maps an outcome to its terminal state.
    #[must_use]
    pub const fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Passed => Self::Passed,
            Outcome::Failed => Self::Failed,
            Outcome::Errored => Self::Errored,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal node state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal node transition from {from} to {to}")]
pub struct StateError {
    /// State before the attempted transition.
    pub from: NodeState,
    /// Requested state.
    pub to: NodeState,
}

// ============================================================================
// SECTION: Evaluation Errors
// ============================================================================

/// Classification of expectation-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced attribute was never registered.
    UnknownAttribute,
    /// Structural indexing failed.
    InvalidPath,
    /// Command template could not be resolved.
    InvalidTemplate,
    /// Command exceeded its timeout.
    CommandTimeout,
    /// Command could not be started.
    CommandFailed,
    /// Zero-exit stdout was not valid JSON.
    MalformedOutput,
    /// Stdout was read from a command that did not succeed.
    EmptyOutput,
    /// Matcher does not support the value combination.
    UnsupportedMatch,
    /// Iteration attribute is missing or not a collection.
    InvalidIteration,
}

impl ErrorKind {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownAttribute => "unknown_attribute",
            Self::InvalidPath => "invalid_path",
            Self::InvalidTemplate => "invalid_template",
            Self::CommandTimeout => "command_timeout",
            Self::CommandFailed => "command_failed",
            Self::MalformedOutput => "malformed_output",
            Self::EmptyOutput => "empty_output",
            Self::UnsupportedMatch => "unsupported_match",
            Self::InvalidIteration => "invalid_iteration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expectation-level error recorded on an errored node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct EvaluationError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl EvaluationError {
    /// Creates a new evaluation error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<AttributeError> for EvaluationError {
    fn from(value: AttributeError) -> Self {
        let kind = match &value {
            AttributeError::UnknownAttribute(_) => ErrorKind::UnknownAttribute,
            AttributeError::InvalidPath { .. } => ErrorKind::InvalidPath,
        };
        Self::new(kind, value.to_string())
    }
}

// ============================================================================
// SECTION: Failure Detail
// ============================================================================

/// Explanation attached to a failed expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Expected value or shape.
    pub expected: Value,
    /// Actual value observed.
    pub actual: Value,
    /// Message naming the first difference.
    pub message: String,
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Result of evaluating a single expectation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The expectation held.
    Pass,
    /// The expectation did not hold.
    Fail(FailureDetail),
    /// The expectation could not be evaluated.
    Error(EvaluationError),
}

impl Verdict {
    /// Returns the outcome for this verdict.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::Pass => Outcome::Passed,
            Self::Fail(_) => Outcome::Failed,
            Self::Error(_) => Outcome::Errored,
        }
    }
}

impl From<EvaluationError> for Verdict {
    fn from(value: EvaluationError) -> Self {
        Self::Error(value)
    }
}
