// crates/compliance-gate-runner/src/sources/chain.rs
// ============================================================================
// Module: Attribute Source Chain
// Description: Ordered merge of several attribute sources.
// Purpose: Layer files, environment, and overrides into one attribute set.
// Dependencies: compliance-gate-core
// ============================================================================

//! ## Overview
//! Sources load in insertion order; a later source replaces any attribute an
//! earlier source defined. The first failing source aborts the load.

use std::collections::BTreeMap;

use compliance_gate_core::AttributeName;
use compliance_gate_core::AttributeSource;
use compliance_gate_core::AttributeSourceError;
use compliance_gate_core::AttributeStore;
use serde_json::Value;

/// Ordered collection of attribute sources.
#[derive(Default)]
pub struct AttributeSourceChain {
    /// Sources in load order.
    sources: Vec<Box<dyn AttributeSource>>,
}

impl AttributeSourceChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source; it overrides every source added before it.
    pub fn push(&mut self, source: Box<dyn AttributeSource>) {
        self.sources.push(source);
    }

    /// Appends a source, builder style.
    #[must_use]
    pub fn with(mut self, source: impl AttributeSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true when the chain has no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Loads every source and freezes the merged result.
    ///
    /// # Errors
    ///
    /// Returns the first [`AttributeSourceError`] raised by a source.
    pub fn build_store(&self) -> Result<AttributeStore, AttributeSourceError> {
        self.load().map(AttributeStore::from_bindings)
    }
}

impl AttributeSource for AttributeSourceChain {
    fn load(&self) -> Result<BTreeMap<AttributeName, Value>, AttributeSourceError> {
        let mut merged = BTreeMap::new();
        for source in &self.sources {
            merged.extend(source.load()?);
        }
        Ok(merged)
    }
}
