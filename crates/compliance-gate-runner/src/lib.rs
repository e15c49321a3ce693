// crates/compliance-gate-runner/src/lib.rs
// ============================================================================
// Module: Compliance Gate Runner
// Description: Process runner, attribute sources, and report delivery.
// Purpose: Provide the operating-system backends for the core interfaces.
// Dependencies: compliance-gate-core, serde_json, serde_yaml, tokio
// ============================================================================

//! ## Overview
//! This crate implements the core boundaries against the local system:
//! [`ProcessCommandRunner`] for [`compliance_gate_core::CommandRunner`],
//! file and environment sources for [`compliance_gate_core::AttributeSource`],
//! and [`JsonReportSink`] for [`compliance_gate_core::ReportSink`]. It also
//! loads suite documents from disk.
//!
//! Invariants:
//! - Commands never pass through a shell; argv is forwarded unchanged.
//! - File and environment inputs are size-limited and fail closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod document;
pub mod process;
pub mod report;
pub mod sources;
pub mod suite;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use document::DocumentError;
pub use document::DocumentFormat;
pub use process::DEFAULT_MAX_OUTPUT_BYTES;
pub use process::ProcessCommandRunner;
pub use process::RunnerContext;
pub use report::JsonReportSink;
pub use sources::AttributeFileFormat;
pub use sources::AttributeSourceChain;
pub use sources::EnvAttributeSource;
pub use sources::EnvAttributeSourceConfig;
pub use sources::FileAttributeSource;
pub use suite::DEFAULT_MAX_SUITE_BYTES;
pub use suite::SuiteLoadError;
pub use suite::load_suite;
