// crates/compliance-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Compliance Gate Interfaces
// Description: Backend-agnostic interfaces for attributes, commands, and reports.
// Purpose: Define the contract surfaces used by the compliance runtime.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! Interfaces keep the engine independent of process spawning, attribute
//! storage, and report delivery. Implementations must be safe for concurrent
//! use and must not rely on ambient global state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::command::CommandResult;
use crate::core::command::ResolvedCommand;
use crate::core::identifiers::AttributeName;
use crate::core::report::RunReport;

// ============================================================================
// SECTION: Attribute Source
// ============================================================================

/// Attribute source errors.
#[derive(Debug, Error)]
pub enum AttributeSourceError {
    /// Source could not be read.
    #[error("attribute source io error: {0}")]
    Io(String),
    /// Source content could not be decoded.
    #[error("attribute source parse error: {0}")]
    Parse(String),
    /// Source content violated a limit or shape requirement.
    #[error("invalid attribute source: {0}")]
    Invalid(String),
}

/// External provider of run attributes.
pub trait AttributeSource: Send + Sync {
    /// Loads every attribute this source provides.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeSourceError`] when the source cannot be read or decoded.
    fn load(&self) -> Result<BTreeMap<AttributeName, Value>, AttributeSourceError>;
}

// ============================================================================
// SECTION: Command Runner
// ============================================================================

/// Command runner errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Process could not be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error message.
        message: String,
    },
    /// Process output could not be collected.
    #[error("failed to collect output: {0}")]
    Io(String),
}

/// Executes one concrete command with a bounded timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command and captures its result.
    ///
    /// Non-zero exits and timeouts are reported in the returned
    /// [`CommandResult`], not as errors.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the process cannot be started or observed.
    async fn execute(
        &self,
        command: &ResolvedCommand,
        timeout: Duration,
    ) -> Result<CommandResult, RunnerError>;
}

// ============================================================================
// SECTION: Report Sink
// ============================================================================

/// Report sink errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report could not be serialized.
    #[error("report serialization error: {0}")]
    Serialization(String),
    /// Report could not be written.
    #[error("report write error: {0}")]
    Io(String),
}

/// Consumer of evaluated run reports.
pub trait ReportSink: Send + Sync {
    /// Accepts a completed report.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the report cannot be delivered.
    fn accept(&self, report: &RunReport) -> Result<(), ReportError>;
}
