// crates/compliance-gate-core/src/core/spec.rs
// ============================================================================
// Module: Compliance Gate Suite Specification
// Description: Declarative controls, examples, expectations, and matchers.
// Purpose: Define the serializable assertion tree and its load-time validation.
// Dependencies: crate::core::{command, identifiers, path}, regex, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A suite is an ordered list of controls. Controls group examples and nested
//! controls and may iterate over a list or mapping attribute. Examples own at
//! most one command and an ordered list of expectations. Suites are plain
//! serde documents and are validated once before any command runs.
//!
//! Expected values are literal JSON unless written as `{"attribute": "<path>"}`,
//! which references an attribute (or iteration binding) instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use regex::Regex;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de;
use serde_json::Value;
use thiserror::Error;

use crate::core::command::CommandSpec;
use crate::core::identifiers::ControlId;
use crate::core::identifiers::ExampleId;
use crate::core::identifiers::join_label;
use crate::core::path::FieldPath;

// ============================================================================
// SECTION: Suite
// ============================================================================

/// Root of a compliance suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Optional suite title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Top-level controls in declaration order.
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
}

impl SuiteSpec {
    /// Validates identifiers, templates, patterns, and subjects.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] describing the first invalid element found.
    pub fn validate(&self) -> Result<(), SpecError> {
        validate_controls(&self.controls, "")
    }
}

/// Named group of examples and nested controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    /// Control identifier, unique among siblings.
    pub control_id: ControlId,
    /// Optional human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional iteration producing one generated child per element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each: Option<IterationSpec>,
    /// Examples in declaration order.
    #[serde(default)]
    pub examples: Vec<ExampleSpec>,
    /// Nested controls in declaration order.
    #[serde(default)]
    pub controls: Vec<Self>,
}

/// Iteration over a list or mapping attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSpec {
    /// Attribute path yielding the collection.
    pub attribute: FieldPath,
    /// Name under which each element is bound.
    pub bind: String,
}

/// Group of expectations sharing one optional command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleSpec {
    /// Example identifier, unique within its control.
    pub example_id: ExampleId,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional command template executed once for this example.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
    /// Expectations in declaration order.
    #[serde(default)]
    pub expectations: Vec<ExpectationSpec>,
}

/// Single check against a subject value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSpec {
    /// Human-readable description.
    pub description: String,
    /// Value under test.
    pub subject: Subject,
    /// Matcher applied to the subject.
    pub matcher: MatcherSpec,
}

// ============================================================================
// SECTION: Subjects
// ============================================================================

/// Source of the value an expectation checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Subject {
    /// Command exit code as a JSON number.
    ExitCode,
    /// Command stderr as a JSON string.
    Stderr,
    /// Parsed command stdout, optionally indexed by a field path.
    Stdout {
        /// Optional path into the parsed output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<FieldPath>,
    },
    /// Attribute or iteration binding value.
    Attribute {
        /// Attribute path.
        path: FieldPath,
    },
}

impl Subject {
    /// Returns true when the subject reads command output.
    #[must_use]
    pub const fn requires_command(&self) -> bool {
        !matches!(self, Self::Attribute { .. })
    }

    /// Returns a short label for reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::ExitCode => "exit_code".to_string(),
            Self::Stderr => "stderr".to_string(),
            Self::Stdout {
                path: None,
            } => "stdout".to_string(),
            Self::Stdout {
                path: Some(path),
            } => format!("stdout:{path}"),
            Self::Attribute {
                path,
            } => format!("attribute:{path}"),
        }
    }
}

// ============================================================================
// SECTION: Matchers
// ============================================================================

/// Reference to an attribute used as an expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeRef {
    /// Attribute path.
    pub attribute: FieldPath,
}

/// Expected value for a matcher.
///
/// Decodes as an attribute reference only from an object whose sole key is
/// `attribute` with a string path; every other JSON value is a literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExpectedValue {
    /// Value resolved from attributes at evaluation time.
    Attribute(AttributeRef),
    /// Literal JSON value.
    Literal(Value),
}

impl ExpectedValue {
    /// Creates a literal expected value.
    #[must_use]
    pub const fn literal(value: Value) -> Self {
        Self::Literal(value)
    }

    /// Creates an attribute reference.
    #[must_use]
    pub const fn attribute(path: FieldPath) -> Self {
        Self::Attribute(AttributeRef {
            attribute: path,
        })
    }
}

impl<'de> Deserialize<'de> for ExpectedValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let reference = match &value {
            Value::Object(map) if map.len() == 1 => match map.get("attribute") {
                Some(Value::String(path)) => Some(path),
                _ => None,
            },
            _ => None,
        };
        match reference {
            Some(path) => FieldPath::parse(path)
                .map(Self::attribute)
                .map_err(|err| de::Error::custom(format!("invalid attribute path '{path}': {err}"))),
            None => Ok(Self::Literal(value)),
        }
    }
}

/// Declarative matcher with its expected operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatcherSpec {
    /// Deep structural equality.
    Equals {
        /// Expected value.
        expected: ExpectedValue,
    },
    /// Negated deep structural equality.
    NotEquals {
        /// Value that must not be observed.
        expected: ExpectedValue,
    },
    /// Subset containment for mappings, lists, and strings.
    Includes {
        /// Subset that must be included.
        expected: ExpectedValue,
    },
    /// Negated subset containment.
    NotIncludes {
        /// Subset that must not be included.
        expected: ExpectedValue,
    },
    /// Mapping lacks the key.
    ExcludesKey {
        /// Key that must be absent.
        key: String,
    },
    /// Value equals one member of the expected list.
    OneOf {
        /// Allowed values.
        expected: ExpectedValue,
    },
    /// Empty string, list, or mapping.
    IsEmpty,
    /// Non-empty string, list, or mapping.
    IsNotEmpty,
    /// JSON null.
    IsNil,
    /// String matches the regular expression.
    MatchesPattern {
        /// Regular expression.
        pattern: String,
    },
    /// String does not match the regular expression.
    NotMatchesPattern {
        /// Regular expression.
        pattern: String,
    },
}

impl MatcherSpec {
    /// Returns the snake-case matcher name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Equals { .. } => "equals",
            Self::NotEquals { .. } => "not_equals",
            Self::Includes { .. } => "includes",
            Self::NotIncludes { .. } => "not_includes",
            Self::ExcludesKey { .. } => "excludes_key",
            Self::OneOf { .. } => "one_of",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::IsNil => "is_nil",
            Self::MatchesPattern { .. } => "matches_pattern",
            Self::NotMatchesPattern { .. } => "not_matches_pattern",
        }
    }

    /// Returns the regular expression source for pattern matchers.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::MatchesPattern {
                pattern,
            }
            | Self::NotMatchesPattern {
                pattern,
            } => Some(pattern),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Suite validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// An identifier was empty.
    #[error("empty identifier in {0}")]
    EmptyIdentifier(String),
    /// Sibling controls share an identifier.
    #[error("duplicate control identifier: {0}")]
    DuplicateControlId(String),
    /// Examples within a control share an identifier.
    #[error("duplicate example identifier: {0}")]
    DuplicateExampleId(String),
    /// Command template failed to parse.
    #[error("invalid command template in {0}: {1}")]
    InvalidTemplate(String, String),
    /// Regular expression failed to compile.
    #[error("invalid pattern in {0}: {1}")]
    InvalidPattern(String, String),
    /// Subject reads command output but the example has no command.
    #[error("expectation {1} in {0} reads {2} but the example has no command")]
    SubjectRequiresCommand(String, usize, String),
    /// Iteration binding name is unusable.
    #[error("invalid iteration binding in {0}: '{1}'")]
    InvalidBinding(String, String),
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Validates a list of sibling controls.
fn validate_controls(controls: &[ControlSpec], parent: &str) -> Result<(), SpecError> {
    let mut seen = BTreeSet::new();
    for control in controls {
        let label = join_label(parent, control.control_id.as_str());
        if control.control_id.as_str().trim().is_empty() {
            return Err(SpecError::EmptyIdentifier(format!("control under '{parent}'")));
        }
        if !seen.insert(control.control_id.as_str()) {
            return Err(SpecError::DuplicateControlId(label));
        }
        if let Some(iteration) = &control.for_each {
            ensure_binding_name(&label, &iteration.bind)?;
        }
        validate_examples(&control.examples, &label)?;
        validate_controls(&control.controls, &label)?;
    }
    Ok(())
}

/// Validates the examples of one control.
fn validate_examples(examples: &[ExampleSpec], control: &str) -> Result<(), SpecError> {
    let mut seen = BTreeSet::new();
    for example in examples {
        let label = join_label(control, example.example_id.as_str());
        if example.example_id.as_str().trim().is_empty() {
            return Err(SpecError::EmptyIdentifier(format!("example under {control}")));
        }
        if !seen.insert(example.example_id.as_str()) {
            return Err(SpecError::DuplicateExampleId(label));
        }
        if let Some(command) = &example.command {
            command
                .parse()
                .map_err(|err| SpecError::InvalidTemplate(label.clone(), err.to_string()))?;
        }
        for (index, expectation) in example.expectations.iter().enumerate() {
            if example.command.is_none() && expectation.subject.requires_command() {
                return Err(SpecError::SubjectRequiresCommand(
                    label,
                    index,
                    expectation.subject.label(),
                ));
            }
            if let Some(pattern) = expectation.matcher.pattern() {
                Regex::new(pattern)
                    .map_err(|err| SpecError::InvalidPattern(label.clone(), err.to_string()))?;
            }
        }
    }
    Ok(())
}

/// Ensures an iteration binding is a plain root name.
fn ensure_binding_name(control: &str, bind: &str) -> Result<(), SpecError> {
    let valid = !bind.is_empty()
        && bind.chars().all(|ch| !ch.is_whitespace() && !matches!(ch, '.' | '[' | ']' | '$'));
    if valid {
        Ok(())
    } else {
        Err(SpecError::InvalidBinding(control.to_string(), bind.to_string()))
    }
}
