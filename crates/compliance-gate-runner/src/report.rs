// crates/compliance-gate-runner/src/report.rs
// ============================================================================
// Module: JSON Report Sink
// Description: Report sink writing serialized run reports.
// Purpose: Deliver evaluated reports to files, pipes, or buffers.
// Dependencies: compliance-gate-core, serde_json
// ============================================================================

//! ## Overview
//! [`JsonReportSink`] writes one JSON document per accepted report followed
//! by a newline. Writes are serialized through a mutex so one sink can be
//! shared across tasks.

use std::io::Write;
use std::sync::Mutex;

use compliance_gate_core::ReportError;
use compliance_gate_core::ReportSink;
use compliance_gate_core::RunReport;

/// Report sink writing JSON to any writer.
pub struct JsonReportSink<W> {
    /// Destination writer.
    writer: Mutex<W>,
    /// Pretty-print output.
    pretty: bool,
}

impl<W: Write + Send> JsonReportSink<W> {
    /// Creates a sink writing compact JSON.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty: false,
        }
    }

    /// Creates a sink writing indented JSON.
    #[must_use]
    pub const fn pretty(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty: true,
        }
    }

    /// Consumes the sink and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] when the writer lock was poisoned.
    pub fn into_inner(self) -> Result<W, ReportError> {
        self.writer.into_inner().map_err(|_| ReportError::Io("report writer poisoned".to_string()))
    }
}

impl<W: Write + Send> ReportSink for JsonReportSink<W> {
    fn accept(&self, report: &RunReport) -> Result<(), ReportError> {
        let payload = if self.pretty {
            serde_json::to_vec_pretty(report)
        } else {
            serde_json::to_vec(report)
        }
        .map_err(|err| ReportError::Serialization(err.to_string()))?;
        let mut writer =
            self.writer.lock().map_err(|_| ReportError::Io("report writer poisoned".to_string()))?;
        writer.write_all(&payload).map_err(|err| ReportError::Io(err.to_string()))?;
        writer.write_all(b"\n").map_err(|err| ReportError::Io(err.to_string()))?;
        writer.flush().map_err(|err| ReportError::Io(err.to_string()))
    }
}
