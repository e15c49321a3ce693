// crates/compliance-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Compliance Gate In-Memory Attributes
// Description: In-memory attribute source and store construction helpers.
// Purpose: Provide deterministic attribute bindings for tests and embedding hosts.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! [`InMemoryAttributeSource`] serves bindings supplied by the caller.
//! [`load_attribute_store`] merges any number of sources in order; later
//! sources override earlier ones for the same name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::AttributeName;
use crate::core::AttributeStore;
use crate::interfaces::AttributeSource;
use crate::interfaces::AttributeSourceError;

// ============================================================================
// SECTION: In-Memory Source
// ============================================================================

/// Attribute source backed by caller-supplied bindings.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttributeSource {
    /// Bindings returned on every load.
    bindings: BTreeMap<AttributeName, Value>,
}

impl InMemoryAttributeSource {
    /// Creates an empty source.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Adds a binding, replacing any earlier value for the name.
    #[must_use]
    pub fn with(mut self, name: impl Into<AttributeName>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }
}

impl AttributeSource for InMemoryAttributeSource {
    fn load(&self) -> Result<BTreeMap<AttributeName, Value>, AttributeSourceError> {
        Ok(self.bindings.clone())
    }
}

// ============================================================================
// SECTION: Store Construction
// ============================================================================

/// Loads every source in order and freezes the merged bindings.
///
/// # Errors
///
/// Returns the first [`AttributeSourceError`] raised by a source.
pub fn load_attribute_store(
    sources: &[&dyn AttributeSource],
) -> Result<AttributeStore, AttributeSourceError> {
    let mut merged = BTreeMap::new();
    for source in sources {
        merged.extend(source.load()?);
    }
    Ok(AttributeStore::from_bindings(merged))
}
