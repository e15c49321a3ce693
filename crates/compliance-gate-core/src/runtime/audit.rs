// crates/compliance-gate-core/src/runtime/audit.rs
// ============================================================================
// Module: Compliance Gate Audit Logging
// Description: Structured audit events for command execution and run completion.
// Purpose: Emit redacted JSON-line logs without a logging framework dependency.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain serde payloads written as one JSON object per line.
//! Command lines can carry attribute values such as project identifiers, so
//! events log a canonical digest of the argv by default; raw command text is
//! included only when explicitly enabled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::HashDigest;
use crate::core::Outcome;
use crate::core::RunSummary;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Redaction Labels
// ============================================================================

/// Redaction label when only digests are logged.
pub const REDACTION_DIGEST_ONLY: &str = "digest_only";
/// Redaction label when raw command text is logged.
pub const REDACTION_COMMAND_TEXT: &str = "command_text";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit payload for one executed command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Canonical digest of the program and arguments.
    pub command_digest: HashDigest,
    /// Raw command text (explicit opt-in only).
    pub command: Option<String>,
    /// Labels of the examples sharing this command.
    pub examples: Vec<String>,
    /// Exit code when the process ran.
    pub exit_code: Option<i32>,
    /// True when the process was terminated after its timeout.
    pub timed_out: bool,
    /// Elapsed milliseconds.
    pub duration_ms: u64,
    /// Captured stdout size.
    pub stdout_bytes: usize,
    /// Captured stderr size.
    pub stderr_bytes: usize,
    /// Runner error message when the process could not run.
    pub error: Option<String>,
    /// Redaction classification.
    pub redaction: &'static str,
}

/// Inputs for [`CommandAuditEvent::new`].
#[derive(Debug, Clone)]
pub struct CommandAuditEventParams {
    /// Canonical digest of the program and arguments.
    pub command_digest: HashDigest,
    /// Raw command text when logging is enabled.
    pub command: Option<String>,
    /// Labels of the examples sharing this command.
    pub examples: Vec<String>,
    /// Exit code when the process ran.
    pub exit_code: Option<i32>,
    /// True when the process timed out.
    pub timed_out: bool,
    /// Elapsed milliseconds.
    pub duration_ms: u64,
    /// Captured stdout size.
    pub stdout_bytes: usize,
    /// Captured stderr size.
    pub stderr_bytes: usize,
    /// Runner error message.
    pub error: Option<String>,
}

impl CommandAuditEvent {
    /// Creates a command audit event stamped with the current time.
    #[must_use]
    pub fn new(params: CommandAuditEventParams) -> Self {
        let redaction =
            if params.command.is_some() { REDACTION_COMMAND_TEXT } else { REDACTION_DIGEST_ONLY };
        Self {
            event: "command_executed",
            timestamp_ms: Timestamp::now().as_unix_millis(),
            command_digest: params.command_digest,
            command: params.command,
            examples: params.examples,
            exit_code: params.exit_code,
            timed_out: params.timed_out,
            duration_ms: params.duration_ms,
            stdout_bytes: params.stdout_bytes,
            stderr_bytes: params.stderr_bytes,
            error: params.error,
            redaction,
        }
    }
}

/// Audit payload emitted when a run completes.
#[derive(Debug, Clone, Serialize)]
pub struct RunAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Rolled-up run outcome.
    pub outcome: Outcome,
    /// Outcome counts.
    pub summary: RunSummary,
    /// Number of distinct commands executed.
    pub distinct_commands: usize,
    /// Run wall time in milliseconds.
    pub duration_ms: i64,
    /// Canonical report digest when hashing succeeded.
    pub report_hash: Option<HashDigest>,
}

impl RunAuditEvent {
    /// Creates a run audit event stamped with the current time.
    #[must_use]
    pub fn new(
        outcome: Outcome,
        summary: RunSummary,
        distinct_commands: usize,
        duration_ms: i64,
        report_hash: Option<HashDigest>,
    ) -> Self {
        Self {
            event: "run_completed",
            timestamp_ms: Timestamp::now().as_unix_millis(),
            outcome,
            summary,
            distinct_commands,
            duration_ms,
            report_hash,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for engine events.
pub trait AuditSink: Send + Sync {
    /// Record a command execution event.
    fn record_command(&self, event: &CommandAuditEvent);

    /// Record a run completion event.
    fn record_run(&self, _event: &RunAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_command(&self, event: &CommandAuditEvent) {
        write_stderr_line(event);
    }

    fn record_run(&self, event: &RunAuditEvent) {
        write_stderr_line(event);
    }
}

/// Writes one serialized event to stderr.
fn write_stderr_line<T: Serialize>(event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(std::io::stderr(), "{payload}");
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_command(&self, event: &CommandAuditEvent) {
        self.append(event);
    }

    fn record_run(&self, event: &RunAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_command(&self, _event: &CommandAuditEvent) {}
}
