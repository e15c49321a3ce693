// crates/compliance-gate-core/src/core/attributes.rs
// ============================================================================
// Module: Compliance Gate Attribute Store
// Description: Immutable run attributes and scoped iteration bindings.
// Purpose: Resolve named runtime attributes and nested fields for commands and assertions.
// Dependencies: crate::core::{identifiers, path}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Attributes are resolved once per run from external sources and then
//! treated as immutable. The store is shared read-only across workers via
//! `Arc`; iteration bindings are layered on top through [`ScopedAttributes`]
//! without copying or mutating the shared store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::AttributeName;
use crate::core::path::FieldPath;
use crate::core::path::lookup_segments;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Attribute resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// The attribute name was never registered for the run.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
    /// Structural indexing into the attribute failed.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// Path text that failed.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Attribute Store
// ============================================================================

/// Immutable attribute bindings for a single run.
///
/// # Invariants
/// - Names are unique; values never change after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    /// Attribute values keyed by name.
    values: BTreeMap<AttributeName, Value>,
}

impl AttributeStore {
    /// Creates an empty attribute store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Creates a store from resolved bindings.
    #[must_use]
    pub const fn from_bindings(values: BTreeMap<AttributeName, Value>) -> Self {
        Self {
            values,
        }
    }

    /// Returns the number of registered attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no attributes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true when the attribute name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&AttributeName::new(name))
    }

    /// Returns registered attribute names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &AttributeName> {
        self.values.keys()
    }

    /// Resolves an attribute by name.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError::UnknownAttribute`] when the name is not registered.
    pub fn resolve(&self, name: &str) -> Result<&Value, AttributeError> {
        self.values
            .get(&AttributeName::new(name))
            .ok_or_else(|| AttributeError::UnknownAttribute(name.to_string()))
    }

    /// Resolves a field path whose root segment names an attribute.
    ///
    /// Filter operands written `${path}` are resolved against the store first.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError`] when the attribute is unknown or indexing fails.
    pub fn resolve_path(&self, path: &FieldPath) -> Result<&Value, AttributeError> {
        let path = path.bind_operands(|operand| self.resolve_path(operand).cloned())?;
        let root = root_name(&path)?;
        let value = self.resolve(root)?;
        index_into(value, &path)
    }
}

// ============================================================================
// SECTION: Scoped Attributes
// ============================================================================

/// Read-only attribute view with iteration bindings layered over the store.
///
/// # Invariants
/// - Later bindings shadow earlier bindings and the shared store.
#[derive(Debug, Clone)]
pub struct ScopedAttributes {
    /// Shared run-wide store.
    base: Arc<AttributeStore>,
    /// Scoped bindings, innermost last.
    bindings: Vec<(AttributeName, Value)>,
}

impl ScopedAttributes {
    /// Creates a root scope with no bindings.
    #[must_use]
    pub const fn new(base: Arc<AttributeStore>) -> Self {
        Self {
            base,
            bindings: Vec::new(),
        }
    }

    /// Returns a child scope with one additional binding.
    #[must_use]
    pub fn bind(&self, name: AttributeName, value: Value) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.push((name, value));
        Self {
            base: Arc::clone(&self.base),
            bindings,
        }
    }

    /// Returns the scoped bindings, outermost first.
    #[must_use]
    pub fn bindings(&self) -> &[(AttributeName, Value)] {
        &self.bindings
    }

    /// Returns the shared run-wide store.
    #[must_use]
    pub fn store(&self) -> &AttributeStore {
        &self.base
    }

    /// Resolves a name, checking scoped bindings before the store.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError::UnknownAttribute`] when the name is not bound anywhere.
    pub fn resolve(&self, name: &str) -> Result<&Value, AttributeError> {
        if let Some((_, value)) =
            self.bindings.iter().rev().find(|(bound, _)| bound.as_str() == name)
        {
            return Ok(value);
        }
        self.base.resolve(name)
    }

    /// Resolves a field path whose root segment names an attribute or binding.
    ///
    /// Filter operands written `${path}` are resolved in this scope first.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError`] when the attribute is unknown or indexing fails.
    pub fn resolve_path(&self, path: &FieldPath) -> Result<&Value, AttributeError> {
        let path = self.bind_path(path)?;
        let root = root_name(&path)?;
        let value = self.resolve(root)?;
        index_into(value, &path)
    }

    /// Replaces `${path}` filter operands with their values in this scope.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError`] when an operand cannot be resolved.
    pub fn bind_path(&self, path: &FieldPath) -> Result<FieldPath, AttributeError> {
        path.bind_operands(|operand| self.resolve_path(operand).cloned())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the attribute name from the root path segment.
fn root_name(path: &FieldPath) -> Result<&str, AttributeError> {
    path.root_name().ok_or_else(|| AttributeError::InvalidPath {
        path: path.to_string(),
        reason: "attribute paths must start with an attribute name".to_string(),
    })
}

/// Applies the non-root segments of a path to a resolved attribute value.
fn index_into<'a>(value: &'a Value, path: &FieldPath) -> Result<&'a Value, AttributeError> {
    lookup_segments(value, path.tail()).map_err(|err| AttributeError::InvalidPath {
        path: path.to_string(),
        reason: err.reason,
    })
}
