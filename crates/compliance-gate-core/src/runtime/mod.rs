// crates/compliance-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Compliance Gate Runtime
// Description: Expansion, matching, parsing, and run orchestration.
// Purpose: Evaluate suites against attributes and command output.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules turn a validated suite into an evaluated report. Only
//! [`engine`] performs asynchronous work; everything else is pure.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod engine;
pub mod expand;
pub mod matcher;
pub mod parser;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::CommandAuditEvent;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RunAuditEvent;
pub use audit::StderrAuditSink;
pub use engine::ComplianceEngine;
pub use engine::DEFAULT_COMMAND_TIMEOUT;
pub use engine::DEFAULT_MAX_CONCURRENCY;
pub use engine::EngineConfig;
pub use engine::EngineError;
pub use expand::ExpansionOptions;
pub use expand::RunPlan;
pub use expand::expand_suite;
pub use matcher::MatchError;
pub use matcher::Matcher;
pub use parser::ParseError;
pub use parser::parse_result;
pub use store::InMemoryAttributeSource;
pub use store::load_attribute_store;
