// crates/compliance-gate-runner/src/sources/env.rs
// ============================================================================
// Module: Environment Attribute Source
// Description: Attributes read from prefixed environment variables.
// Purpose: Expose CI-provided parameters such as project and region.
// Dependencies: compliance-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The environment source selects variables by prefix and strips it to form
//! attribute names, so `CG_PROJECT_ID` becomes `PROJECT_ID` (or `project_id`
//! with lowercasing). Allowlist and denylist rules apply to the full
//! variable name, and key and value sizes are hard limits that fail the load.
//! An override map replaces the process environment for deterministic runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use compliance_gate_core::AttributeName;
use compliance_gate_core::AttributeSource;
use compliance_gate_core::AttributeSourceError;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the environment source.
///
/// # Invariants
/// - `denylist` overrides `allowlist` when both are present.
/// - `max_value_bytes` and `max_key_bytes` are enforced as hard upper bounds.
/// - `overrides` take precedence over process environment reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvAttributeSourceConfig {
    /// Prefix selecting variables; stripped from attribute names.
    pub prefix: String,
    /// Lowercase attribute names after stripping the prefix.
    pub lowercase_names: bool,
    /// Decode values as JSON when they parse, keeping strings otherwise.
    pub parse_json: bool,
    /// Optional allowlist of full variable names.
    pub allowlist: Option<BTreeSet<String>>,
    /// Explicit denylist of full variable names.
    pub denylist: BTreeSet<String>,
    /// Maximum bytes allowed for a single value.
    pub max_value_bytes: usize,
    /// Maximum bytes allowed for a single key.
    pub max_key_bytes: usize,
    /// Optional override map used instead of the process environment.
    pub overrides: Option<BTreeMap<String, String>>,
}

impl Default for EnvAttributeSourceConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            lowercase_names: false,
            parse_json: false,
            allowlist: None,
            denylist: BTreeSet::new(),
            max_value_bytes: 64 * 1024,
            max_key_bytes: 255,
            overrides: None,
        }
    }
}

// ============================================================================
// SECTION: Source
// ============================================================================

/// Attribute source for environment variables.
pub struct EnvAttributeSource {
    /// Source configuration, including policy and size limits.
    config: EnvAttributeSourceConfig,
}

impl EnvAttributeSource {
    /// Creates an environment source with the given configuration.
    #[must_use]
    pub const fn new(config: EnvAttributeSourceConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the raw candidate variables.
    fn variables(&self) -> Vec<(String, String)> {
        let Some(overrides) = &self.config.overrides else {
            // Variables with non-UTF-8 keys or values are skipped.
            return std::env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect();
        };
        overrides.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
    }

    /// Converts one selected variable into an attribute binding.
    fn binding(
        &self,
        key: &str,
        value: String,
    ) -> Result<Option<(AttributeName, Value)>, AttributeSourceError> {
        let Some(stripped) = key.strip_prefix(self.config.prefix.as_str()) else {
            return Ok(None);
        };
        if stripped.is_empty() || !is_key_allowed(&self.config, key) {
            return Ok(None);
        }
        if key.len() > self.config.max_key_bytes {
            return Err(AttributeSourceError::Invalid(format!("env key {key} exceeds limit")));
        }
        if value.len() > self.config.max_value_bytes {
            return Err(AttributeSourceError::Invalid(format!("env value for {key} exceeds limit")));
        }
        let name = if self.config.lowercase_names {
            stripped.to_ascii_lowercase()
        } else {
            stripped.to_string()
        };
        let value = if self.config.parse_json {
            serde_json::from_str(&value).unwrap_or(Value::String(value))
        } else {
            Value::String(value)
        };
        Ok(Some((AttributeName::new(name), value)))
    }
}

impl AttributeSource for EnvAttributeSource {
    fn load(&self) -> Result<BTreeMap<AttributeName, Value>, AttributeSourceError> {
        let mut attributes = BTreeMap::new();
        for (key, value) in self.variables() {
            if let Some((name, value)) = self.binding(&key, value)? {
                attributes.insert(name, value);
            }
        }
        Ok(attributes)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates the key against allowlist/denylist policy.
fn is_key_allowed(config: &EnvAttributeSourceConfig, key: &str) -> bool {
    if config.denylist.contains(key) {
        return false;
    }
    if let Some(allowlist) = &config.allowlist {
        return allowlist.contains(key);
    }
    true
}
