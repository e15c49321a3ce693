// crates/compliance-gate-core/src/core/report.rs
// ============================================================================
// Module: Compliance Gate Run Report
// Description: Immutable evaluated assertion tree with summaries.
// Purpose: Hand report sinks a complete, ordered, hashable run result.
// Dependencies: crate::core::{hashing, identifiers, outcome, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! The run report mirrors the expanded assertion tree in declaration order.
//! Node outcomes are computed once at construction from their children, so a
//! report can never disagree with itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ControlId;
use crate::core::identifiers::ExampleId;
use crate::core::identifiers::join_label;
use crate::core::outcome::EvaluationError;
use crate::core::outcome::FailureDetail;
use crate::core::outcome::Outcome;
use crate::core::outcome::Verdict;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Run Report
// ============================================================================

/// Evaluated result of one suite run.
///
/// # Invariants
/// - `outcome` is the roll-up of `controls`.
/// - Sibling order matches suite declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Optional suite title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Run start time.
    pub started_at: Timestamp,
    /// Run finish time.
    pub finished_at: Timestamp,
    /// Number of distinct commands executed.
    pub distinct_commands: usize,
    /// Rolled-up run outcome.
    pub outcome: Outcome,
    /// Evaluated top-level controls.
    pub controls: Vec<ControlReport>,
}

impl RunReport {
    /// Builds a report and computes the rolled-up outcome.
    #[must_use]
    pub fn new(
        title: Option<String>,
        started_at: Timestamp,
        finished_at: Timestamp,
        distinct_commands: usize,
        controls: Vec<ControlReport>,
    ) -> Self {
        let outcome = Outcome::aggregate(controls.iter().map(|control| control.outcome));
        Self {
            title,
            started_at,
            finished_at,
            distinct_commands,
            outcome,
            controls,
        }
    }

    /// Counts nodes by outcome at each level.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for control in &self.controls {
            control.tally(&mut summary);
        }
        summary
    }

    /// Flattens the tree into leaf records with hierarchical labels.
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatRecord> {
        let mut records = Vec::new();
        for control in &self.controls {
            control.flatten_into("", &mut records);
        }
        records
    }

    /// Computes the canonical digest of the report.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn canonical_hash(&self, algorithm: HashAlgorithm) -> Result<HashDigest, HashError> {
        hash_canonical_json(algorithm, self)
    }
}

// ============================================================================
// SECTION: Control Report
// ============================================================================

/// Evaluated control node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReport {
    /// Control identifier (generated children carry the element suffix).
    pub control_id: ControlId,
    /// Optional title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Element bound for generated iteration children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Value>,
    /// Rolled-up outcome.
    pub outcome: Outcome,
    /// Expansion error, when the control could not be expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EvaluationError>,
    /// Evaluated examples.
    pub examples: Vec<ExampleReport>,
    /// Evaluated nested controls.
    pub controls: Vec<Self>,
}

impl ControlReport {
    /// Builds a control report from evaluated children.
    #[must_use]
    pub fn from_children(
        control_id: ControlId,
        title: Option<String>,
        binding: Option<Value>,
        examples: Vec<ExampleReport>,
        controls: Vec<Self>,
    ) -> Self {
        let outcome = Outcome::aggregate(
            examples
                .iter()
                .map(|example| example.outcome)
                .chain(controls.iter().map(|control| control.outcome)),
        );
        Self {
            control_id,
            title,
            binding,
            outcome,
            error: None,
            examples,
            controls,
        }
    }

    /// Builds an errored control report for an expansion failure.
    #[must_use]
    pub const fn errored(
        control_id: ControlId,
        title: Option<String>,
        binding: Option<Value>,
        error: EvaluationError,
    ) -> Self {
        Self {
            control_id,
            title,
            binding,
            outcome: Outcome::Errored,
            error: Some(error),
            examples: Vec::new(),
            controls: Vec::new(),
        }
    }

    /// Adds this subtree to the summary.
    fn tally(&self, summary: &mut RunSummary) {
        summary.controls.record(self.outcome);
        for example in &self.examples {
            summary.examples.record(example.outcome);
            for expectation in &example.expectations {
                summary.expectations.record(expectation.outcome);
            }
        }
        for control in &self.controls {
            control.tally(summary);
        }
    }

    /// Appends leaf records for this subtree.
    fn flatten_into(&self, parent: &str, records: &mut Vec<FlatRecord>) {
        let label = join_label(parent, self.control_id.as_str());
        if let Some(error) = &self.error {
            records.push(FlatRecord {
                label: label.clone(),
                description: self.title.clone().unwrap_or_default(),
                outcome: self.outcome,
                message: Some(error.to_string()),
            });
        }
        for example in &self.examples {
            example.flatten_into(&label, records);
        }
        for control in &self.controls {
            control.flatten_into(&label, records);
        }
    }
}

// ============================================================================
// SECTION: Example Report
// ============================================================================

/// Command execution facts attached to an example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSummary {
    /// Rendered command line.
    pub command: String,
    /// Exit code.
    pub exit_code: i32,
    /// Elapsed time in milliseconds.
    pub duration_ms: u64,
    /// True when the command was terminated after its timeout.
    pub timed_out: bool,
}

/// Evaluated example node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleReport {
    /// Example identifier.
    pub example_id: ExampleId,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Command execution facts, when a command ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSummary>,
    /// Rolled-up outcome.
    pub outcome: Outcome,
    /// Example-level error (template resolution, spawn failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EvaluationError>,
    /// Evaluated expectations in declaration order.
    pub expectations: Vec<ExpectationReport>,
}

impl ExampleReport {
    /// Builds an example report and computes its outcome.
    ///
    /// An example-level error forces `Errored` even without expectations.
    #[must_use]
    pub fn new(
        example_id: ExampleId,
        description: Option<String>,
        command: Option<CommandSummary>,
        error: Option<EvaluationError>,
        expectations: Vec<ExpectationReport>,
    ) -> Self {
        let rolled = Outcome::aggregate(expectations.iter().map(|expectation| expectation.outcome));
        let outcome = if error.is_some() { Outcome::Errored } else { rolled };
        Self {
            example_id,
            description,
            command,
            outcome,
            error,
            expectations,
        }
    }

    /// Appends leaf records for this example.
    fn flatten_into(&self, parent: &str, records: &mut Vec<FlatRecord>) {
        let label = join_label(parent, self.example_id.as_str());
        if self.expectations.is_empty() {
            records.push(FlatRecord {
                label,
                description: self.description.clone().unwrap_or_default(),
                outcome: self.outcome,
                message: self.error.as_ref().map(ToString::to_string),
            });
            return;
        }
        for (index, expectation) in self.expectations.iter().enumerate() {
            records.push(FlatRecord {
                label: format!("{label}#{index}"),
                description: expectation.description.clone(),
                outcome: expectation.outcome,
                message: expectation.message(),
            });
        }
    }
}

// ============================================================================
// SECTION: Expectation Report
// ============================================================================

/// Evaluated expectation leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationReport {
    /// Description from the suite.
    pub description: String,
    /// Subject label.
    pub subject: String,
    /// Matcher name.
    pub matcher: String,
    /// Resolved outcome.
    pub outcome: Outcome,
    /// Failure detail for failed expectations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
    /// Error for errored expectations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EvaluationError>,
}

impl ExpectationReport {
    /// Builds an expectation report from a verdict.
    #[must_use]
    pub fn from_verdict(
        description: String,
        subject: String,
        matcher: String,
        verdict: Verdict,
    ) -> Self {
        let outcome = verdict.outcome();
        let (failure, error) = match verdict {
            Verdict::Pass => (None, None),
            Verdict::Fail(detail) => (Some(detail), None),
            Verdict::Error(error) => (None, Some(error)),
        };
        Self {
            description,
            subject,
            matcher,
            outcome,
            failure,
            error,
        }
    }

    /// Returns the failure or error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.failure
            .as_ref()
            .map(|detail| detail.message.clone())
            .or_else(|| self.error.as_ref().map(ToString::to_string))
    }
}

// ============================================================================
// SECTION: Summaries
// ============================================================================

/// Count of nodes per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// Passed nodes.
    pub passed: usize,
    /// Failed nodes.
    pub failed: usize,
    /// Errored nodes.
    pub errored: usize,
}

impl OutcomeCounts {
    /// Records one node outcome.
    pub const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Errored => self.errored += 1,
        }
    }

    /// Returns the total node count.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.errored
    }
}

/// Outcome counts at each tree level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Control counts, including generated and nested controls.
    pub controls: OutcomeCounts,
    /// Example counts.
    pub examples: OutcomeCounts,
    /// Expectation counts.
    pub expectations: OutcomeCounts,
}

/// Leaf record produced by [`RunReport::flatten`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRecord {
    /// Hierarchical label (`control/child/example#index`).
    pub label: String,
    /// Leaf description.
    pub description: String,
    /// Leaf outcome.
    pub outcome: Outcome,
    /// Failure or error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
