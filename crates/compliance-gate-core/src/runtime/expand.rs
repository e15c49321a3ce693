// crates/compliance-gate-core/src/runtime/expand.rs
// ============================================================================
// Module: Compliance Gate Expansion
// Description: Eager expansion of a suite into a concrete evaluation plan.
// Purpose: Resolve iterations, templates, and attribute operands before execution.
// Dependencies: crate::core, crate::runtime::matcher, serde_json
// ============================================================================

//! ## Overview
//! Expansion walks the suite once with a scoped attribute view. Iterating
//! controls become one generated child per list element or mapping entry,
//! each with the element bound under the iteration's `bind` name. Command
//! templates are resolved into concrete commands and collected into the set
//! of distinct commands the run must execute.
//!
//! Failures here never abort a run: they are carried in the plan and surface
//! as errored nodes in the report.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use crate::core::AttributeName;
use crate::core::AttributeStore;
use crate::core::ControlId;
use crate::core::ControlSpec;
use crate::core::ErrorKind;
use crate::core::EvaluationError;
use crate::core::ExampleId;
use crate::core::ExampleSpec;
use crate::core::ExpectationSpec;
use crate::core::FieldPath;
use crate::core::MatcherSpec;
use crate::core::NodeState;
use crate::core::ResolvedCommand;
use crate::core::ScopedAttributes;
use crate::core::Subject;
use crate::core::SuiteSpec;
use crate::core::TemplateError;
use crate::core::identifiers::join_label;
use crate::core::path::describe_kind;
use crate::runtime::matcher::Matcher;

// ============================================================================
// SECTION: Plan Types
// ============================================================================

/// Options that alter expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionOptions {
    /// Append a synthesized "stderr is empty" expectation to examples with commands.
    pub require_empty_stderr: bool,
}

/// Fully expanded suite ready for execution.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Optional suite title.
    pub title: Option<String>,
    /// Expanded top-level controls.
    pub controls: Vec<PlannedControl>,
    /// Distinct commands mapped to the labels of the examples that use them.
    pub commands: BTreeMap<ResolvedCommand, Vec<String>>,
}

/// Expanded control node.
#[derive(Debug, Clone)]
pub struct PlannedControl {
    /// Control identifier (with element suffix for generated children).
    pub control_id: ControlId,
    /// Optional title.
    pub title: Option<String>,
    /// Element bound for generated children.
    pub binding: Option<Value>,
    /// Expansion error.
    pub error: Option<EvaluationError>,
    /// Lifecycle state, advanced by the engine.
    pub state: NodeState,
    /// Expanded examples.
    pub examples: Vec<PlannedExample>,
    /// Expanded nested controls.
    pub controls: Vec<Self>,
}

/// Expanded example node.
#[derive(Debug, Clone)]
pub struct PlannedExample {
    /// Example identifier.
    pub example_id: ExampleId,
    /// Hierarchical label used in audit events.
    pub label: String,
    /// Optional description.
    pub description: Option<String>,
    /// Resolved command, if any, or the reason it could not be resolved.
    pub command: Option<Result<ResolvedCommand, EvaluationError>>,
    /// Lifecycle state, advanced by the engine.
    pub state: NodeState,
    /// Expanded expectations in order.
    pub expectations: Vec<PlannedExpectation>,
}

/// Subject with attribute values already resolved.
#[derive(Debug, Clone)]
pub enum PlannedSubject {
    /// Command exit code.
    ExitCode,
    /// Command stderr.
    Stderr,
    /// Parsed stdout at an optional path with filter operands bound, or the
    /// reason an operand could not be bound.
    Stdout(Result<Option<FieldPath>, EvaluationError>),
    /// Attribute value resolved at expansion time.
    Value(Result<Value, EvaluationError>),
}

impl PlannedSubject {
    /// Returns true when the subject reads command output.
    #[must_use]
    pub const fn requires_command(&self) -> bool {
        !matches!(self, Self::Value(_))
    }
}

/// Expanded expectation leaf.
#[derive(Debug, Clone)]
pub struct PlannedExpectation {
    /// Description.
    pub description: String,
    /// Subject label for reports.
    pub subject_label: String,
    /// Matcher name for reports.
    pub matcher_name: &'static str,
    /// Resolved subject.
    pub subject: PlannedSubject,
    /// Resolved matcher or the reason it could not be resolved.
    pub matcher: Result<Matcher, EvaluationError>,
    /// Lifecycle state, advanced by the engine.
    pub state: NodeState,
}

// ============================================================================
// SECTION: Expansion
// ============================================================================

/// Expands a validated suite against the run's attributes.
#[must_use]
pub fn expand_suite(
    suite: &SuiteSpec,
    attributes: Arc<AttributeStore>,
    options: ExpansionOptions,
) -> RunPlan {
    let mut expander = Expander {
        options,
        commands: BTreeMap::new(),
    };
    let scope = ScopedAttributes::new(attributes);
    let controls = suite
        .controls
        .iter()
        .map(|control| expander.control(control, &scope, ""))
        .collect();
    RunPlan {
        title: suite.title.clone(),
        controls,
        commands: expander.commands,
    }
}

/// Expansion state shared across the walk.
struct Expander {
    /// Expansion options.
    options: ExpansionOptions,
    /// Distinct commands collected so far.
    commands: BTreeMap<ResolvedCommand, Vec<String>>,
}

impl Expander {
    /// Expands one declared control.
    fn control(
        &mut self,
        spec: &ControlSpec,
        scope: &ScopedAttributes,
        parent: &str,
    ) -> PlannedControl {
        let label = join_label(parent, spec.control_id.as_str());
        let Some(iteration) = &spec.for_each else {
            return self.concrete(spec, spec.control_id.clone(), None, scope, &label);
        };
        let elements = match iteration_elements(scope, &iteration.attribute) {
            Ok(elements) => elements,
            Err(error) => {
                return PlannedControl {
                    control_id: spec.control_id.clone(),
                    title: spec.title.clone(),
                    binding: None,
                    error: Some(error),
                    state: NodeState::Pending,
                    examples: Vec::new(),
                    controls: Vec::new(),
                };
            }
        };
        let bind = AttributeName::new(iteration.bind.clone());
        let children = elements
            .into_iter()
            .map(|(suffix, element)| {
                let child_id = ControlId::new(format!("{}[{suffix}]", spec.control_id));
                let child_label = join_label(&label, child_id.as_str());
                let child_scope = scope.bind(bind.clone(), element.clone());
                self.concrete(spec, child_id, Some(element), &child_scope, &child_label)
            })
            .collect();
        PlannedControl {
            control_id: spec.control_id.clone(),
            title: spec.title.clone(),
            binding: None,
            error: None,
            state: NodeState::Pending,
            examples: Vec::new(),
            controls: children,
        }
    }

    /// Expands the body of a control under a fixed scope.
    fn concrete(
        &mut self,
        spec: &ControlSpec,
        control_id: ControlId,
        binding: Option<Value>,
        scope: &ScopedAttributes,
        label: &str,
    ) -> PlannedControl {
        let examples =
            spec.examples.iter().map(|example| self.example(example, scope, label)).collect();
        let controls =
            spec.controls.iter().map(|control| self.control(control, scope, label)).collect();
        PlannedControl {
            control_id,
            title: spec.title.clone(),
            binding,
            error: None,
            state: NodeState::Pending,
            examples,
            controls,
        }
    }

    /// Expands one example.
    fn example(
        &mut self,
        spec: &ExampleSpec,
        scope: &ScopedAttributes,
        parent: &str,
    ) -> PlannedExample {
        let label = join_label(parent, spec.example_id.as_str());
        let command = spec.command.as_ref().map(|command| {
            let resolved = command.parse().and_then(|template| template.resolve(scope));
            match resolved {
                Ok(resolved) => {
                    self.commands.entry(resolved.clone()).or_default().push(label.clone());
                    Ok(resolved)
                }
                Err(err) => Err(template_error(err)),
            }
        });
        let mut expectations: Vec<PlannedExpectation> = spec
            .expectations
            .iter()
            .map(|expectation| plan_expectation(expectation, scope))
            .collect();
        if self.options.require_empty_stderr && command.is_some() {
            expectations.push(PlannedExpectation {
                description: "stderr is empty".to_string(),
                subject_label: Subject::Stderr.label(),
                matcher_name: MatcherSpec::IsEmpty.name(),
                subject: PlannedSubject::Stderr,
                matcher: Ok(Matcher::IsEmpty),
                state: NodeState::Pending,
            });
        }
        PlannedExample {
            example_id: spec.example_id.clone(),
            label,
            description: spec.description.clone(),
            command,
            state: NodeState::Pending,
            expectations,
        }
    }
}

/// Expands one expectation.
fn plan_expectation(spec: &ExpectationSpec, scope: &ScopedAttributes) -> PlannedExpectation {
    let subject = match &spec.subject {
        Subject::ExitCode => PlannedSubject::ExitCode,
        Subject::Stderr => PlannedSubject::Stderr,
        Subject::Stdout {
            path,
        } => PlannedSubject::Stdout(
            path.as_ref()
                .map(|path| scope.bind_path(path))
                .transpose()
                .map_err(EvaluationError::from),
        ),
        Subject::Attribute {
            path,
        } => PlannedSubject::Value(
            scope.resolve_path(path).cloned().map_err(EvaluationError::from),
        ),
    };
    PlannedExpectation {
        description: spec.description.clone(),
        subject_label: spec.subject.label(),
        matcher_name: spec.matcher.name(),
        subject,
        matcher: Matcher::resolve(&spec.matcher, scope).map_err(EvaluationError::from),
        state: NodeState::Pending,
    }
}

/// Resolves the elements of an iteration attribute with their id suffixes.
fn iteration_elements(
    scope: &ScopedAttributes,
    path: &FieldPath,
) -> Result<Vec<(String, Value)>, EvaluationError> {
    let value = scope.resolve_path(path).map_err(EvaluationError::from)?;
    match value {
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item.clone()))
            .collect()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), json!({ "key": key, "value": value })))
            .collect()),
        other => Err(EvaluationError::new(
            ErrorKind::InvalidIteration,
            format!(
                "iteration attribute {path} is a {}, expected a list or mapping",
                describe_kind(other)
            ),
        )),
    }
}

/// Maps a template error to an evaluation error.
fn template_error(err: TemplateError) -> EvaluationError {
    match err {
        TemplateError::Attribute(err) => err.into(),
        other => EvaluationError::new(ErrorKind::InvalidTemplate, other.to_string()),
    }
}
