// crates/compliance-gate-runner/src/document.rs
// ============================================================================
// Module: Document Loading
// Description: Size-limited reads of JSON and YAML documents.
// Purpose: Share bounded file decoding between suites and attribute files.
// Dependencies: serde, serde_json, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Documents are read with a hard byte limit before decoding. The format is
//! chosen from the file extension: `.yaml` and `.yml` decode as YAML,
//! everything else as JSON.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

impl DocumentFormat {
    /// Picks the format from a path extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }

    /// Decodes bytes in this format.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] when decoding fails.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, DocumentError> {
        match self {
            Self::Json => {
                serde_json::from_slice(bytes).map_err(|err| DocumentError::Parse(err.to_string()))
            }
            Self::Yaml => {
                serde_yaml::from_slice(bytes).map_err(|err| DocumentError::Parse(err.to_string()))
            }
        }
    }
}

/// Document loading errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// File could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// File exceeded the byte limit.
    #[error("{path} exceeds size limit of {limit} bytes")]
    TooLarge {
        /// Offending path.
        path: String,
        /// Configured limit.
        limit: usize,
    },
    /// Content could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Reads a file, failing when it holds more than `max_bytes` bytes.
///
/// # Errors
///
/// Returns [`DocumentError`] when the file cannot be read or is too large.
pub fn read_limited(path: &Path, max_bytes: usize) -> Result<Vec<u8>, DocumentError> {
    let io_error = |err: std::io::Error| DocumentError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    };
    let file = File::open(path).map_err(io_error)?;
    let mut bytes = Vec::new();
    let cap = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    file.take(cap).read_to_end(&mut bytes).map_err(io_error)?;
    if bytes.len() > max_bytes {
        return Err(DocumentError::TooLarge {
            path: path.display().to_string(),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and decodes a document using the format implied by its extension.
///
/// # Errors
///
/// Returns [`DocumentError`] when reading or decoding fails.
pub fn load_document<T: DeserializeOwned>(path: &Path, max_bytes: usize) -> Result<T, DocumentError> {
    let bytes = read_limited(path, max_bytes)?;
    DocumentFormat::from_path(path).decode(&bytes)
}
