// crates/compliance-gate-core/src/core/mod.rs
// ============================================================================
// Module: Compliance Gate Core Types
// Description: Canonical suite, attribute, command, and report structures.
// Purpose: Provide stable, serializable types shared by the runtime and adapters.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Core types define suite specifications, attribute resolution, command
//! templates, parsed output, outcomes, and the evaluated run report. Nothing
//! in this module performs I/O.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod attributes;
pub mod command;
pub mod hashing;
pub mod identifiers;
pub mod outcome;
pub mod path;
pub mod report;
pub mod spec;
pub mod time;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use attributes::AttributeError;
pub use attributes::AttributeStore;
pub use attributes::ScopedAttributes;
pub use command::CommandResult;
pub use command::CommandSpec;
pub use command::CommandTemplate;
pub use command::ResolvedCommand;
pub use command::TIMED_OUT_EXIT_CODE;
pub use command::TemplateError;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::AttributeName;
pub use identifiers::ControlId;
pub use identifiers::ExampleId;
pub use outcome::ErrorKind;
pub use outcome::EvaluationError;
pub use outcome::FailureDetail;
pub use outcome::NodeState;
pub use outcome::Outcome;
pub use outcome::StateError;
pub use outcome::Verdict;
pub use path::FieldPath;
pub use path::FilterOperand;
pub use path::PathParseError;
pub use path::PathSegment;
pub use report::CommandSummary;
pub use report::ControlReport;
pub use report::ExampleReport;
pub use report::ExpectationReport;
pub use report::FlatRecord;
pub use report::OutcomeCounts;
pub use report::RunReport;
pub use report::RunSummary;
pub use spec::AttributeRef;
pub use spec::ControlSpec;
pub use spec::ExampleSpec;
pub use spec::ExpectationSpec;
pub use spec::ExpectedValue;
pub use spec::IterationSpec;
pub use spec::MatcherSpec;
pub use spec::SpecError;
pub use spec::Subject;
pub use spec::SuiteSpec;
pub use time::Timestamp;
pub use value::ParsedValue;
