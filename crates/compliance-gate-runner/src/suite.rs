// crates/compliance-gate-runner/src/suite.rs
// ============================================================================
// Module: Suite Loading
// Description: Reads and validates suite documents from disk.
// Purpose: Reject oversized, malformed, or inconsistent suites before a run.
// Dependencies: compliance-gate-core, thiserror
// ============================================================================

//! ## Overview
//! Suites are JSON or YAML documents decoding into [`SuiteSpec`]. Loading
//! validates the decoded suite so callers only ever see runnable suites.

use std::path::Path;

use compliance_gate_core::SpecError;
use compliance_gate_core::SuiteSpec;
use thiserror::Error;

use crate::document::DocumentError;
use crate::document::load_document;

/// Default suite size limit.
pub const DEFAULT_MAX_SUITE_BYTES: usize = 4 * 1024 * 1024;

/// Suite loading errors.
#[derive(Debug, Error)]
pub enum SuiteLoadError {
    /// Suite document could not be read or decoded.
    #[error("failed to load suite: {0}")]
    Document(#[from] DocumentError),
    /// Suite decoded but failed validation.
    #[error("invalid suite: {0}")]
    Invalid(#[from] SpecError),
}

/// Loads and validates a suite document.
///
/// # Errors
///
/// Returns [`SuiteLoadError`] when the document cannot be read, decoded, or validated.
pub fn load_suite(path: &Path, max_bytes: usize) -> Result<SuiteSpec, SuiteLoadError> {
    let suite: SuiteSpec = load_document(path, max_bytes)?;
    suite.validate()?;
    Ok(suite)
}
