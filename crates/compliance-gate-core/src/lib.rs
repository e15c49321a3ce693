// crates/compliance-gate-core/src/lib.rs
// ============================================================================
// Module: Compliance Gate Core Library
// Description: Public API surface for the Compliance Gate core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Compliance Gate core evaluates declarative compliance suites: it resolves
//! named attributes, runs verification commands through an explicit runner
//! interface, matches their JSON output against expected shapes, and rolls
//! outcomes up into a hierarchical report. Process spawning, attribute files,
//! and configuration live in adapter crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::AttributeSource;
pub use interfaces::AttributeSourceError;
pub use interfaces::CommandRunner;
pub use interfaces::ReportError;
pub use interfaces::ReportSink;
pub use interfaces::RunnerError;
pub use runtime::AuditSink;
pub use runtime::ComplianceEngine;
pub use runtime::EngineConfig;
pub use runtime::EngineError;
pub use runtime::FileAuditSink;
pub use runtime::InMemoryAttributeSource;
pub use runtime::MatchError;
pub use runtime::Matcher;
pub use runtime::NoopAuditSink;
pub use runtime::ParseError;
pub use runtime::StderrAuditSink;
