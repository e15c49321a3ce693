// crates/compliance-gate-runner/src/sources/mod.rs
// ============================================================================
// Module: Attribute Sources
// Description: Built-in attribute sources for files and the environment.
// Purpose: Turn external facts into attribute bindings for a run.
// Dependencies: compliance-gate-core
// ============================================================================

//! ## Overview
//! Attribute inputs are untrusted: every source enforces size limits and
//! fails the load instead of silently dropping malformed data.

pub mod chain;
pub mod env;
pub mod file;

pub use chain::AttributeSourceChain;
pub use env::EnvAttributeSource;
pub use env::EnvAttributeSourceConfig;
pub use file::AttributeFileFormat;
pub use file::DEFAULT_MAX_ATTRIBUTE_FILE_BYTES;
pub use file::FileAttributeSource;
