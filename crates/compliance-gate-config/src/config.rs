// crates/compliance-gate-config/src/config.rs
// ============================================================================
// Module: Compliance Gate Configuration
// Description: Configuration loading and validation for Compliance Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: compliance-gate-core, compliance-gate-runner, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Missing files, malformed TOML, unknown sections, and out-of-range values
//! all fail the load.
//!
//! Relative paths inside the file (attribute files, the audit log, the
//! runner working directory) resolve against the directory that holds the
//! configuration file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use compliance_gate_core::AttributeSourceError;
use compliance_gate_core::AttributeStore;
use compliance_gate_core::AuditSink;
use compliance_gate_core::ComplianceEngine;
use compliance_gate_core::EngineConfig;
use compliance_gate_core::FileAuditSink;
use compliance_gate_core::NoopAuditSink;
use compliance_gate_core::StderrAuditSink;
use compliance_gate_runner::AttributeFileFormat;
use compliance_gate_runner::AttributeSourceChain;
use compliance_gate_runner::DEFAULT_MAX_OUTPUT_BYTES;
use compliance_gate_runner::EnvAttributeSource;
use compliance_gate_runner::EnvAttributeSourceConfig;
use compliance_gate_runner::FileAttributeSource;
use compliance_gate_runner::ProcessCommandRunner;
use compliance_gate_runner::RunnerContext;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "compliance-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "COMPLIANCE_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default number of concurrently executing commands.
pub(crate) const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Upper bound for `engine.max_concurrency`.
pub(crate) const MAX_MAX_CONCURRENCY: usize = 256;
/// Default per-command timeout in milliseconds.
pub(crate) const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
/// Minimum per-command timeout in milliseconds.
pub(crate) const MIN_COMMAND_TIMEOUT_MS: u64 = 100;
/// Maximum per-command timeout in milliseconds (one hour).
pub(crate) const MAX_COMMAND_TIMEOUT_MS: u64 = 3_600_000;
/// Minimum capture limit per output stream.
pub(crate) const MIN_MAX_OUTPUT_BYTES: usize = 1024;
/// Maximum capture limit per output stream.
pub(crate) const MAX_MAX_OUTPUT_BYTES: usize = 64 * 1024 * 1024;
/// Maximum number of runner environment entries.
pub(crate) const MAX_RUNNER_ENV_ENTRIES: usize = 256;
/// Maximum number of attribute sources.
pub(crate) const MAX_ATTRIBUTE_SOURCES: usize = 64;
/// Maximum size accepted for a single attribute file.
pub(crate) const MAX_ATTRIBUTE_FILE_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Compliance Gate configuration loaded from disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplianceGateConfig {
    /// Engine limits and checks.
    #[serde(default)]
    pub engine: EngineSection,
    /// Process runner settings.
    #[serde(default)]
    pub runner: RunnerSection,
    /// Attribute sources, applied in order.
    #[serde(default)]
    pub attributes: Vec<AttributeSourceConfig>,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Directory relative paths resolve against (not serialized).
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl ComplianceGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.base_dir =
            resolved.parent().filter(|dir| !dir.as_os_str().is_empty()).map(Path::to_path_buf);
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.runner.validate()?;
        if self.attributes.len() > MAX_ATTRIBUTE_SOURCES {
            return Err(ConfigError::Invalid("too many attribute sources".to_string()));
        }
        for (index, source) in self.attributes.iter().enumerate() {
            source.validate(index)?;
        }
        self.audit.validate()
    }

    /// Builds the engine configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrency: self.engine.max_concurrency,
            command_timeout: Duration::from_millis(self.engine.command_timeout_ms),
            require_empty_stderr: self.engine.require_empty_stderr,
            log_command_text: self.audit.log_command_text,
            ..EngineConfig::default()
        }
    }

    /// Builds the process execution context.
    #[must_use]
    pub fn runner_context(&self) -> RunnerContext {
        RunnerContext {
            env: self.runner.env.clone(),
            working_dir: self.runner.working_dir.as_deref().map(|dir| self.resolve(dir)),
            clear_env: self.runner.clear_env,
            max_output_bytes: self.runner.max_output_bytes,
        }
    }

    /// Builds the process command runner.
    #[must_use]
    pub fn command_runner(&self) -> ProcessCommandRunner {
        ProcessCommandRunner::new(self.runner_context())
    }

    /// Builds the ordered attribute source chain.
    #[must_use]
    pub fn attribute_chain(&self) -> AttributeSourceChain {
        let mut chain = AttributeSourceChain::new();
        for source in &self.attributes {
            match source {
                AttributeSourceConfig::File(file) => {
                    let mut built = FileAttributeSource::new(self.resolve(&file.path))
                        .with_format(file.format)
                        .with_max_bytes(file.max_bytes);
                    if let Some(root) = &file.root {
                        built = built.with_root(self.resolve(root));
                    }
                    chain.push(Box::new(built));
                }
                AttributeSourceConfig::Env(env) => {
                    chain.push(Box::new(EnvAttributeSource::new(env.source_config())));
                }
            }
        }
        chain
    }

    /// Loads every configured attribute source into a frozen store.
    ///
    /// # Errors
    ///
    /// Returns the first [`AttributeSourceError`] raised by a source.
    pub fn attribute_store(&self) -> Result<AttributeStore, AttributeSourceError> {
        self.attribute_chain().build_store()
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit log cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        match self.audit.sink {
            AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkKind::File => {
                let path = self
                    .audit
                    .path
                    .as_deref()
                    .ok_or_else(|| ConfigError::Invalid("audit.path is required".to_string()))?;
                let sink = FileAuditSink::new(&self.resolve(path))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Builds an engine wired to the process runner and configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit sink or engine cannot be built.
    pub fn build_engine(&self) -> Result<ComplianceEngine, ConfigError> {
        let audit = self.audit_sink()?;
        let engine = ComplianceEngine::new(Arc::new(self.command_runner()), self.engine_config())
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(engine.with_audit_sink(audit))
    }

    /// Resolves a configured path against the config file directory.
    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Engine configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Maximum number of commands executing at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Per-command timeout in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Require every command to leave stderr empty.
    #[serde(default)]
    pub require_empty_stderr: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            command_timeout_ms: default_command_timeout_ms(),
            require_empty_stderr: false,
        }
    }
}

impl EngineSection {
    /// Validates engine limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 || self.max_concurrency > MAX_MAX_CONCURRENCY {
            return Err(ConfigError::Invalid("engine.max_concurrency out of range".to_string()));
        }
        if !(MIN_COMMAND_TIMEOUT_MS ..= MAX_COMMAND_TIMEOUT_MS).contains(&self.command_timeout_ms)
        {
            return Err(ConfigError::Invalid("engine.command_timeout_ms out of range".to_string()));
        }
        Ok(())
    }
}

/// Process runner configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    /// Working directory for spawned processes.
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Start processes with an empty environment.
    #[serde(default)]
    pub clear_env: bool,
    /// Maximum captured bytes per output stream.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Environment variables set on every process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            working_dir: None,
            clear_env: false,
            max_output_bytes: default_max_output_bytes(),
            env: BTreeMap::new(),
        }
    }
}

impl RunnerSection {
    /// Validates runner settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.working_dir {
            validate_path_string("runner.working_dir", dir)?;
        }
        if !(MIN_MAX_OUTPUT_BYTES ..= MAX_MAX_OUTPUT_BYTES).contains(&self.max_output_bytes) {
            return Err(ConfigError::Invalid("runner.max_output_bytes out of range".to_string()));
        }
        if self.env.len() > MAX_RUNNER_ENV_ENTRIES {
            return Err(ConfigError::Invalid("runner.env has too many entries".to_string()));
        }
        for (key, value) in &self.env {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(ConfigError::Invalid(format!("runner.env key '{key}' is invalid")));
            }
            if value.contains('\0') {
                return Err(ConfigError::Invalid(format!(
                    "runner.env value for {key} contains nul"
                )));
            }
        }
        Ok(())
    }
}

/// Attribute source configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeSourceConfig {
    /// Attributes decoded from a JSON or YAML document.
    File(FileSourceConfig),
    /// Attributes read from prefixed environment variables.
    Env(EnvSourceConfig),
}

impl AttributeSourceConfig {
    /// Validates one attribute source entry.
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        match self {
            Self::File(file) => file.validate(index),
            Self::Env(env) => env.validate(index),
        }
    }
}

/// File attribute source settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSourceConfig {
    /// Path to the attribute document.
    pub path: String,
    /// Document layout.
    #[serde(default)]
    pub format: AttributeFileFormat,
    /// Maximum file size in bytes.
    #[serde(default = "default_attribute_file_bytes")]
    pub max_bytes: usize,
    /// Optional directory the file must reside in.
    #[serde(default)]
    pub root: Option<String>,
}

impl FileSourceConfig {
    /// Validates file source settings.
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        validate_path_string(&format!("attributes[{index}].path"), &self.path)?;
        if let Some(root) = &self.root {
            validate_path_string(&format!("attributes[{index}].root"), root)?;
        }
        if self.max_bytes == 0 || self.max_bytes > MAX_ATTRIBUTE_FILE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "attributes[{index}].max_bytes out of range"
            )));
        }
        Ok(())
    }
}

/// Environment attribute source settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvSourceConfig {
    /// Prefix selecting variables; stripped from attribute names.
    #[serde(default)]
    pub prefix: String,
    /// Lowercase attribute names after stripping the prefix.
    #[serde(default)]
    pub lowercase_names: bool,
    /// Decode values as JSON when they parse.
    #[serde(default)]
    pub parse_json: bool,
    /// Optional allowlist of full variable names.
    #[serde(default)]
    pub allowlist: Option<BTreeSet<String>>,
    /// Denylist of full variable names.
    #[serde(default)]
    pub denylist: BTreeSet<String>,
}

impl EnvSourceConfig {
    /// Validates environment source settings.
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.prefix.is_empty() && self.allowlist.is_none() {
            return Err(ConfigError::Invalid(format!(
                "attributes[{index}] env source requires a prefix or an allowlist"
            )));
        }
        if self.prefix.contains('=') || self.prefix.contains('\0') {
            return Err(ConfigError::Invalid(format!("attributes[{index}].prefix is invalid")));
        }
        Ok(())
    }

    /// Converts settings into the runtime source configuration.
    fn source_config(&self) -> EnvAttributeSourceConfig {
        EnvAttributeSourceConfig {
            prefix: self.prefix.clone(),
            lowercase_names: self.lowercase_names,
            parse_json: self.parse_json,
            allowlist: self.allowlist.clone(),
            denylist: self.denylist.clone(),
            ..EnvAttributeSourceConfig::default()
        }
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
}

/// Audit configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (file sink only).
    #[serde(default)]
    pub path: Option<String>,
    /// Include raw command text in audit events.
    #[serde(default)]
    pub log_command_text: bool,
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from an explicit argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default engine concurrency.
const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Default command timeout in milliseconds.
const fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_MS
}

/// Default capture limit per stream.
const fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}

/// Default attribute file size limit.
const fn default_attribute_file_bytes() -> usize {
    compliance_gate_runner::sources::DEFAULT_MAX_ATTRIBUTE_FILE_BYTES
}
