// crates/compliance-gate-config/src/lib.rs
// ============================================================================
// Module: Compliance Gate Config Library
// Description: Configuration model, validation, and component builders.
// Purpose: Single source of truth for compliance-gate.toml semantics.
// Dependencies: compliance-gate-core, compliance-gate-runner, serde, toml
// ============================================================================

//! ## Overview
//! `compliance-gate-config` defines the configuration model for Compliance
//! Gate. It validates fail-closed and turns a loaded file into the engine
//! configuration, the process runner, the attribute store, and the audit
//! sink.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
