// crates/compliance-gate-core/src/runtime/engine.rs
// ============================================================================
// Module: Compliance Gate Engine
// Description: Run orchestration from suite validation to the final report.
// Purpose: Execute each distinct command once under a concurrency limit and roll up outcomes.
// Dependencies: crate::{core, interfaces, runtime}, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! A run proceeds in four phases:
//! 1. validate the suite (the only fatal failure),
//! 2. expand iterations and resolve templates into a plan,
//! 3. execute every distinct command once, in parallel, bounded by
//!    `max_concurrency`,
//! 4. evaluate expectations sequentially per example against the fetched
//!    results and assemble the report in declaration order.
//!
//! Execution order across commands is unspecified; report order is not.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::core::AttributeStore;
use crate::core::CommandResult;
use crate::core::CommandSummary;
use crate::core::ControlReport;
use crate::core::ErrorKind;
use crate::core::EvaluationError;
use crate::core::ExampleReport;
use crate::core::ExpectationReport;
use crate::core::HashAlgorithm;
use crate::core::NodeState;
use crate::core::ParsedValue;
use crate::core::ResolvedCommand;
use crate::core::RunReport;
use crate::core::SpecError;
use crate::core::StateError;
use crate::core::SuiteSpec;
use crate::core::Timestamp;
use crate::core::Verdict;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::interfaces::CommandRunner;
use crate::interfaces::ReportError;
use crate::interfaces::ReportSink;
use crate::interfaces::RunnerError;
use crate::runtime::audit::AuditSink;
use crate::runtime::audit::CommandAuditEvent;
use crate::runtime::audit::CommandAuditEventParams;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::audit::RunAuditEvent;
use crate::runtime::expand::ExpansionOptions;
use crate::runtime::expand::PlannedControl;
use crate::runtime::expand::PlannedExample;
use crate::runtime::expand::PlannedExpectation;
use crate::runtime::expand::PlannedSubject;
use crate::runtime::expand::RunPlan;
use crate::runtime::expand::expand_suite;
use crate::runtime::parser::ParseError;
use crate::runtime::parser::parse_result;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default number of commands executing at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of commands executing at once.
    pub max_concurrency: usize,
    /// Per-command timeout.
    pub command_timeout: Duration,
    /// Append a "stderr is empty" expectation to every example with a command.
    pub require_empty_stderr: bool,
    /// Hash algorithm for report and command digests.
    pub hash_algorithm: HashAlgorithm,
    /// Include raw command text in audit events.
    pub log_command_text: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            require_empty_stderr: false,
            hash_algorithm: HashAlgorithm::default(),
            log_command_text: false,
        }
    }
}

impl EngineConfig {
    /// Validates configuration bounds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when a bound is violated.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_concurrency == 0 {
            return Err(EngineError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(EngineError::InvalidConfig("command_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Engine errors. Everything else becomes a node outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Suite failed validation.
    #[error("invalid suite: {0}")]
    InvalidSuite(#[from] SpecError),
    /// Engine configuration is invalid.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
    /// A plan node was already evaluated.
    #[error(transparent)]
    State(#[from] StateError),
    /// Report sink rejected the report.
    #[error(transparent)]
    Report(#[from] ReportError),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Captured outcome of executing one distinct command.
enum Execution {
    /// Process ran (possibly timed out); stdout parsed once.
    Completed {
        /// Captured result.
        result: CommandResult,
        /// Parsed stdout.
        parsed: Result<ParsedValue, ParseError>,
    },
    /// Process could not be run.
    Failed(EvaluationError),
}

/// Compliance assertion engine.
pub struct ComplianceEngine {
    /// Command execution boundary.
    runner: Arc<dyn CommandRunner>,
    /// Engine configuration.
    config: EngineConfig,
    /// Audit event sink.
    audit: Arc<dyn AuditSink>,
}

impl ComplianceEngine {
    /// Creates an engine with a no-op audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when the configuration is invalid.
    pub fn new(runner: Arc<dyn CommandRunner>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            runner,
            config,
            audit: Arc::new(NoopAuditSink),
        })
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a suite against the given attributes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSuite`] when the suite fails validation.
    pub async fn run(
        &self,
        suite: &SuiteSpec,
        attributes: Arc<AttributeStore>,
    ) -> Result<RunReport, EngineError> {
        let mut plan = self.plan(suite, attributes)?;
        self.run_plan(&mut plan).await
    }

    /// Validates and expands a suite without running any command.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSuite`] when the suite fails validation.
    pub fn plan(
        &self,
        suite: &SuiteSpec,
        attributes: Arc<AttributeStore>,
    ) -> Result<RunPlan, EngineError> {
        suite.validate()?;
        let options = ExpansionOptions {
            require_empty_stderr: self.config.require_empty_stderr,
        };
        Ok(expand_suite(suite, attributes, options))
    }

    /// Executes a plan's commands and evaluates its nodes.
    ///
    /// Every node moves from `Pending` to a terminal state; the plan's command
    /// set is consumed. A plan can therefore be evaluated only once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::State`] when a node was already evaluated.
    pub async fn run_plan(&self, plan: &mut RunPlan) -> Result<RunReport, EngineError> {
        let started_at = Timestamp::now();
        let executions = self.execute_commands(std::mem::take(&mut plan.commands)).await;
        let controls = plan
            .controls
            .iter_mut()
            .map(|control| self.evaluate_control(control, &executions))
            .collect::<Result<Vec<_>, _>>()?;
        let finished_at = Timestamp::now();
        let report = RunReport::new(
            plan.title.clone(),
            started_at,
            finished_at,
            executions.len(),
            controls,
        );
        let report_hash = report.canonical_hash(self.config.hash_algorithm).ok();
        self.audit.record_run(&RunAuditEvent::new(
            report.outcome,
            report.summary(),
            report.distinct_commands,
            finished_at.as_unix_millis().saturating_sub(started_at.as_unix_millis()),
            report_hash,
        ));
        Ok(report)
    }

    /// Runs a suite and hands the report to a sink.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the suite is invalid or the sink fails.
    pub async fn run_and_publish(
        &self,
        suite: &SuiteSpec,
        attributes: Arc<AttributeStore>,
        sink: &dyn ReportSink,
    ) -> Result<RunReport, EngineError> {
        let report = self.run(suite, attributes).await?;
        sink.accept(&report)?;
        Ok(report)
    }

    /// Executes every distinct command once under the concurrency limit.
    async fn execute_commands(
        &self,
        commands: BTreeMap<ResolvedCommand, Vec<String>>,
    ) -> BTreeMap<ResolvedCommand, Execution> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let timeout = self.config.command_timeout;
        let mut handles = Vec::with_capacity(commands.len());
        for (command, examples) in commands {
            let permit = Arc::clone(&semaphore).acquire_owned().await.ok();
            let runner = Arc::clone(&self.runner);
            let task_command = command.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                runner.execute(&task_command, timeout).await
            });
            handles.push((command, examples, handle));
        }

        let mut executions = BTreeMap::new();
        for (command, examples, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => Err(RunnerError::Io(format!("command task failed: {err}"))),
            };
            self.audit_command(&command, examples, &outcome);
            let execution = match outcome {
                Ok(result) => {
                    let parsed = parse_result(&result);
                    Execution::Completed {
                        result,
                        parsed,
                    }
                }
                Err(err) => Execution::Failed(EvaluationError::new(
                    ErrorKind::CommandFailed,
                    err.to_string(),
                )),
            };
            executions.insert(command, execution);
        }
        executions
    }

    /// Emits the audit event for one executed command.
    fn audit_command(
        &self,
        command: &ResolvedCommand,
        examples: Vec<String>,
        outcome: &Result<CommandResult, RunnerError>,
    ) {
        let algorithm = self.config.hash_algorithm;
        let command_digest = hash_canonical_json(algorithm, command)
            .unwrap_or_else(|_| hash_bytes(algorithm, command.to_string().as_bytes()));
        let command_text = self.config.log_command_text.then(|| command.to_string());
        let params = match outcome {
            Ok(result) => CommandAuditEventParams {
                command_digest,
                command: command_text,
                examples,
                exit_code: Some(result.exit_code),
                timed_out: result.timed_out,
                duration_ms: result.duration_ms(),
                stdout_bytes: result.stdout.len(),
                stderr_bytes: result.stderr.len(),
                error: None,
            },
            Err(err) => CommandAuditEventParams {
                command_digest,
                command: command_text,
                examples,
                exit_code: None,
                timed_out: false,
                duration_ms: 0,
                stdout_bytes: 0,
                stderr_bytes: 0,
                error: Some(err.to_string()),
            },
        };
        self.audit.record_command(&CommandAuditEvent::new(params));
    }

    /// Evaluates an expanded control subtree.
    fn evaluate_control(
        &self,
        control: &mut PlannedControl,
        executions: &BTreeMap<ResolvedCommand, Execution>,
    ) -> Result<ControlReport, StateError> {
        if let Some(error) = &control.error {
            control.state = control.state.transition(NodeState::Errored)?;
            return Ok(ControlReport::errored(
                control.control_id.clone(),
                control.title.clone(),
                control.binding.clone(),
                error.clone(),
            ));
        }
        control.state = control.state.begin()?;
        let examples = control
            .examples
            .iter_mut()
            .map(|example| self.evaluate_example(example, executions))
            .collect::<Result<Vec<_>, _>>()?;
        let controls = control
            .controls
            .iter_mut()
            .map(|child| self.evaluate_control(child, executions))
            .collect::<Result<Vec<_>, _>>()?;
        let report = ControlReport::from_children(
            control.control_id.clone(),
            control.title.clone(),
            control.binding.clone(),
            examples,
            controls,
        );
        control.state = control.state.finish(report.outcome)?;
        Ok(report)
    }

    /// Evaluates one example's expectations in order.
    fn evaluate_example(
        &self,
        example: &mut PlannedExample,
        executions: &BTreeMap<ResolvedCommand, Execution>,
    ) -> Result<ExampleReport, StateError> {
        example.state = example.state.begin()?;
        let mut summary = None;
        let mut output = None;
        let mut example_error = None;
        match &example.command {
            None => {}
            Some(Err(error)) => example_error = Some(error.clone()),
            Some(Ok(command)) => match executions.get(command) {
                Some(Execution::Completed {
                    result,
                    parsed,
                }) => {
                    summary = Some(CommandSummary {
                        command: command.to_string(),
                        exit_code: result.exit_code,
                        duration_ms: result.duration_ms(),
                        timed_out: result.timed_out,
                    });
                    if result.timed_out {
                        example_error = Some(EvaluationError::new(
                            ErrorKind::CommandTimeout,
                            format!(
                                "command timed out after {} ms (limit {} ms)",
                                result.duration_ms(),
                                self.config.command_timeout.as_millis()
                            ),
                        ));
                    } else {
                        output = Some((result, parsed));
                    }
                }
                Some(Execution::Failed(error)) => example_error = Some(error.clone()),
                None => {
                    example_error = Some(EvaluationError::new(
                        ErrorKind::CommandFailed,
                        "command was not executed",
                    ));
                }
            },
        }

        let mut expectations = Vec::with_capacity(example.expectations.len());
        for expectation in &mut example.expectations {
            expectation.state = expectation.state.begin()?;
            let verdict = example_error.as_ref().map_or_else(
                || evaluate_expectation(expectation, output),
                |error| Verdict::Error(error.clone()),
            );
            expectation.state = expectation.state.finish(verdict.outcome())?;
            expectations.push(ExpectationReport::from_verdict(
                expectation.description.clone(),
                expectation.subject_label.clone(),
                expectation.matcher_name.to_string(),
                verdict,
            ));
        }
        let report = ExampleReport::new(
            example.example_id.clone(),
            example.description.clone(),
            summary,
            example_error,
            expectations,
        );
        example.state = example.state.finish(report.outcome)?;
        Ok(report)
    }
}

// ============================================================================
// SECTION: Expectation Evaluation
// ============================================================================

/// Evaluates one expectation against the example's command output.
fn evaluate_expectation(
    expectation: &PlannedExpectation,
    output: Option<(&CommandResult, &Result<ParsedValue, ParseError>)>,
) -> Verdict {
    let matcher = match &expectation.matcher {
        Ok(matcher) => matcher,
        Err(error) => return Verdict::Error(error.clone()),
    };
    let actual = match subject_value(&expectation.subject, output) {
        Ok(actual) => actual,
        Err(error) => return Verdict::Error(error),
    };
    matcher.evaluate(&actual).unwrap_or_else(|err| Verdict::Error(err.into()))
}

/// Produces the actual value for a subject.
fn subject_value(
    subject: &PlannedSubject,
    output: Option<(&CommandResult, &Result<ParsedValue, ParseError>)>,
) -> Result<Value, EvaluationError> {
    if let PlannedSubject::Value(value) = subject {
        return value.clone();
    }
    let Some((result, parsed)) = output else {
        return Err(EvaluationError::new(
            ErrorKind::CommandFailed,
            "subject reads command output but no command ran",
        ));
    };
    match subject {
        PlannedSubject::ExitCode => Ok(Value::from(result.exit_code)),
        PlannedSubject::Stderr => Ok(Value::String(result.stderr_text())),
        PlannedSubject::Stdout(path) => {
            let path = path.as_ref().map_err(Clone::clone)?;
            let parsed = parsed.as_ref().map_err(|err| EvaluationError::from(err.clone()))?;
            let ParsedValue::Json(value) = parsed else {
                return Err(EvaluationError::new(
                    ErrorKind::EmptyOutput,
                    format!(
                        "command exited with status {}; stdout is unavailable",
                        result.exit_code
                    ),
                ));
            };
            match path {
                None => Ok(value.clone()),
                Some(path) => path.lookup(value).cloned().map_err(|err| {
                    EvaluationError::new(ErrorKind::InvalidPath, format!("stdout {path}: {err}"))
                }),
            }
        }
        PlannedSubject::Value(value) => value.clone(),
    }
}
