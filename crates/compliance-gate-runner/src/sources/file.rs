// crates/compliance-gate-runner/src/sources/file.rs
// ============================================================================
// Module: File Attribute Source
// Description: Attributes decoded from a JSON or YAML file.
// Purpose: Load infrastructure facts such as Terraform outputs.
// Dependencies: compliance-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The file source reads one mapping document. In `plain` format every
//! top-level key becomes an attribute. In `terraform_output` format each
//! entry is the `terraform output -json` shape and only its `value` is kept.
//!
//! When a root directory is configured the canonical file path must stay
//! inside it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use compliance_gate_core::AttributeName;
use compliance_gate_core::AttributeSource;
use compliance_gate_core::AttributeSourceError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::document::DocumentError;
use crate::document::load_document;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default file size limit.
pub const DEFAULT_MAX_ATTRIBUTE_FILE_BYTES: usize = 1024 * 1024;

/// Layout of an attribute file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeFileFormat {
    /// Top-level keys map directly to attribute values.
    #[default]
    Plain,
    /// `terraform output -json` entries; each value is unwrapped.
    TerraformOutput,
}

/// Attribute source backed by a file.
///
/// # Invariants
/// - Files larger than `max_bytes` are rejected before decoding.
/// - The document root must be a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributeSource {
    /// File to read.
    path: PathBuf,
    /// Document layout.
    format: AttributeFileFormat,
    /// Maximum file size.
    max_bytes: usize,
    /// Optional directory the file must reside in.
    root: Option<PathBuf>,
}

impl FileAttributeSource {
    /// Creates a plain-format source with the default size limit.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: AttributeFileFormat::Plain,
            max_bytes: DEFAULT_MAX_ATTRIBUTE_FILE_BYTES,
            root: None,
        }
    }

    /// Sets the document layout.
    #[must_use]
    pub const fn with_format(mut self, format: AttributeFileFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the file size limit.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Confines the file to a root directory.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Returns the configured path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensures the path resolves inside the configured root.
    fn check_root(&self) -> Result<(), AttributeSourceError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let canonical_root = root.canonicalize().map_err(|err| {
            AttributeSourceError::Io(format!("{}: {err}", root.display()))
        })?;
        let canonical = self.path.canonicalize().map_err(|err| {
            AttributeSourceError::Io(format!("{}: {err}", self.path.display()))
        })?;
        if canonical.starts_with(&canonical_root) {
            Ok(())
        } else {
            Err(AttributeSourceError::Invalid(format!(
                "{} escapes root {}",
                self.path.display(),
                root.display()
            )))
        }
    }
}

impl AttributeSource for FileAttributeSource {
    fn load(&self) -> Result<BTreeMap<AttributeName, Value>, AttributeSourceError> {
        self.check_root()?;
        let document: Value = load_document(&self.path, self.max_bytes).map_err(|err| match err {
            DocumentError::Io {
                ..
            } => AttributeSourceError::Io(err.to_string()),
            DocumentError::TooLarge {
                ..
            } => AttributeSourceError::Invalid(err.to_string()),
            DocumentError::Parse(message) => {
                AttributeSourceError::Parse(format!("{}: {message}", self.path.display()))
            }
        })?;
        let Value::Object(entries) = document else {
            return Err(AttributeSourceError::Invalid(format!(
                "{}: attribute document must be a mapping",
                self.path.display()
            )));
        };
        let mut attributes = BTreeMap::new();
        for (name, entry) in entries {
            let value = match self.format {
                AttributeFileFormat::Plain => entry,
                AttributeFileFormat::TerraformOutput => unwrap_output(&name, entry)?,
            };
            attributes.insert(AttributeName::new(name), value);
        }
        Ok(attributes)
    }
}

/// Extracts `value` from a Terraform output entry.
fn unwrap_output(name: &str, entry: Value) -> Result<Value, AttributeSourceError> {
    match entry {
        Value::Object(mut fields) => fields.remove("value").ok_or_else(|| {
            AttributeSourceError::Invalid(format!("terraform output {name} has no value"))
        }),
        _ => Err(AttributeSourceError::Invalid(format!(
            "terraform output {name} must be a mapping"
        ))),
    }
}
