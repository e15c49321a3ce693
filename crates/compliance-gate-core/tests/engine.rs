// crates/compliance-gate-core/tests/engine.rs
// ============================================================================
// Module: Compliance Engine Tests
// Description: End-to-end runs against a scripted command runner.
// Purpose: Validate execution sharing, roll-up, iteration, and error handling.
// ============================================================================

//! ## Overview
//! Runs suites through [`ComplianceEngine`] with an in-memory runner that
//! counts invocations, so tests can assert on sharing and concurrency
//! without spawning processes.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use compliance_gate_core::AttributeName;
use compliance_gate_core::AttributeStore;
use compliance_gate_core::AuditSink;
use compliance_gate_core::CommandResult;
use compliance_gate_core::CommandRunner;
use compliance_gate_core::ComplianceEngine;
use compliance_gate_core::ControlReport;
use compliance_gate_core::EngineConfig;
use compliance_gate_core::EngineError;
use compliance_gate_core::ErrorKind;
use compliance_gate_core::ExampleReport;
use compliance_gate_core::NodeState;
use compliance_gate_core::Outcome;
use compliance_gate_core::ReportError;
use compliance_gate_core::ReportSink;
use compliance_gate_core::ResolvedCommand;
use compliance_gate_core::RunReport;
use compliance_gate_core::RunnerError;
use compliance_gate_core::StateError;
use compliance_gate_core::SuiteSpec;
use compliance_gate_core::runtime::CommandAuditEvent;
use compliance_gate_core::runtime::RunAuditEvent;
use compliance_gate_core::runtime::audit::REDACTION_COMMAND_TEXT;
use compliance_gate_core::runtime::audit::REDACTION_DIGEST_ONLY;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

#[derive(Clone)]
enum Scripted {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    Timeout,
    SpawnError,
}

fn exit(code: i32, stdout: &str, stderr: &str) -> Scripted {
    Scripted::Exit {
        code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[derive(Default)]
struct ScriptedRunner {
    responses: BTreeMap<String, Scripted>,
    calls: Mutex<BTreeMap<String, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl ScriptedRunner {
    fn new() -> Self {
        Self::default()
    }

    fn respond(mut self, command: &str, response: Scripted) -> Self {
        self.responses.insert(command.to_string(), response);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self, command: &str) -> usize {
        self.calls.lock().unwrap().get(command).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(
        &self,
        command: &ResolvedCommand,
        timeout: Duration,
    ) -> Result<CommandResult, RunnerError> {
        let key = command.to_string();
        *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.responses.get(&key).cloned() {
            Some(Scripted::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(CommandResult::completed(
                code,
                stdout.into_bytes(),
                stderr.into_bytes(),
                Duration::from_millis(5),
            )),
            Some(Scripted::Timeout) => Ok(CommandResult::timed_out(Vec::new(), timeout)),
            Some(Scripted::SpawnError) | None => Err(RunnerError::Spawn {
                program: command.program.clone(),
                message: "No such file or directory".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct CapturingAudit {
    commands: Mutex<Vec<CommandAuditEvent>>,
    runs: Mutex<Vec<RunAuditEvent>>,
}

impl AuditSink for CapturingAudit {
    fn record_command(&self, event: &CommandAuditEvent) {
        self.commands.lock().unwrap().push(event.clone());
    }

    fn record_run(&self, event: &RunAuditEvent) {
        self.runs.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
struct CollectingSink {
    reports: Mutex<Vec<RunReport>>,
}

impl ReportSink for CollectingSink {
    fn accept(&self, report: &RunReport) -> Result<(), ReportError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

fn attributes(value: Value) -> Arc<AttributeStore> {
    let Value::Object(map) = value else {
        panic!("attributes must be a mapping");
    };
    let bindings = map.into_iter().map(|(name, value)| (AttributeName::new(name), value)).collect();
    Arc::new(AttributeStore::from_bindings(bindings))
}

fn suite(value: Value) -> SuiteSpec {
    serde_json::from_value(value).unwrap()
}

fn engine(runner: &Arc<ScriptedRunner>, config: EngineConfig) -> ComplianceEngine {
    ComplianceEngine::new(Arc::clone(runner) as Arc<dyn CommandRunner>, config).unwrap()
}

fn example<'a>(report: &'a RunReport, control: usize, example: usize) -> &'a ExampleReport {
    &report.controls[control].examples[example]
}

fn subnet_suite() -> SuiteSpec {
    suite(json!({
        "title": "subnets",
        "controls": [{
            "control_id": "subnets",
            "for_each": { "attribute": "subnets", "bind": "subnet" },
            "examples": [{
                "example_id": "describe",
                "command": "gcloud describe ${subnet.name}",
                "expectations": [
                    {
                        "description": "private",
                        "subject": { "source": "stdout" },
                        "matcher": { "kind": "includes", "expected": { "purpose": "PRIVATE" } }
                    },
                    {
                        "description": "region matches binding",
                        "subject": { "source": "stdout", "path": "region" },
                        "matcher": { "kind": "equals", "expected": { "attribute": "subnet.region" } }
                    }
                ]
            }]
        }]
    }))
}

// ============================================================================
// SECTION: End-to-End Scenarios
// ============================================================================

/// Verifies parsed stdout feeds mapping matchers.
#[tokio::test]
async fn zero_exit_json_passes_includes_and_excludes_key() {
    let runner = Arc::new(
        ScriptedRunner::new().respond("gcloud describe subnet", exit(0, r#"{"purpose":"PRIVATE"}"#, "")),
    );
    let spec = suite(json!({
        "controls": [{
            "control_id": "subnet",
            "examples": [{
                "example_id": "purpose",
                "command": "gcloud describe subnet",
                "expectations": [
                    {
                        "description": "private",
                        "subject": { "source": "stdout" },
                        "matcher": { "kind": "includes", "expected": { "purpose": "PRIVATE" } }
                    },
                    {
                        "description": "no role",
                        "subject": { "source": "stdout" },
                        "matcher": { "kind": "excludes_key", "key": "role" }
                    }
                ]
            }]
        }]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    assert_eq!(report.outcome, Outcome::Passed);
    let example = example(&report, 0, 0);
    assert_eq!(example.expectations.len(), 2);
    assert!(example.expectations.iter().all(|expectation| expectation.outcome == Outcome::Passed));
    let command = example.command.as_ref().unwrap();
    assert_eq!(command.command, "gcloud describe subnet");
    assert_eq!(command.exit_code, 0);
    assert!(!command.timed_out);
}

/// Verifies nonzero exits error stdout subjects but still expose exit code and stderr.
#[tokio::test]
async fn nonzero_exit_errors_stdout_subjects_and_fails_exit_code() {
    let runner = Arc::new(ScriptedRunner::new().respond("gcloud describe missing", exit(1, "", "not found")));
    let spec = suite(json!({
        "controls": [{
            "control_id": "subnet",
            "examples": [{
                "example_id": "missing",
                "command": "gcloud describe missing",
                "expectations": [
                    {
                        "description": "private",
                        "subject": { "source": "stdout", "path": "purpose" },
                        "matcher": { "kind": "equals", "expected": "PRIVATE" }
                    },
                    {
                        "description": "succeeds",
                        "subject": { "source": "exit_code" },
                        "matcher": { "kind": "equals", "expected": 0 }
                    },
                    {
                        "description": "reports not found",
                        "subject": { "source": "stderr" },
                        "matcher": { "kind": "equals", "expected": "not found" }
                    }
                ]
            }]
        }]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    let example = example(&report, 0, 0);
    let [stdout, exit_code, stderr] = example.expectations.as_slice() else {
        panic!("expected three expectations");
    };
    assert_eq!(stdout.outcome, Outcome::Errored);
    let error = stdout.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::EmptyOutput);
    assert_eq!(error.message, "command exited with status 1; stdout is unavailable");

    assert_eq!(exit_code.outcome, Outcome::Failed);
    assert_eq!(
        exit_code.failure.as_ref().unwrap().message,
        "value mismatch at $: expected 0, got 1"
    );
    assert_eq!(stderr.outcome, Outcome::Passed);

    assert_eq!(example.outcome, Outcome::Errored);
    assert_eq!(report.outcome, Outcome::Errored);
}

/// Verifies identical commands run once across examples.
#[tokio::test]
async fn shared_command_runs_once_for_all_examples() {
    let runner = Arc::new(
        ScriptedRunner::new().respond("gcloud list networks", exit(0, r#"["hub-vpc","spoke-vpc"]"#, "")),
    );
    let spec = suite(json!({
        "controls": [
            {
                "control_id": "hub",
                "examples": [{
                    "example_id": "listed",
                    "command": "gcloud list networks",
                    "expectations": [
                        {
                            "description": "hub listed",
                            "subject": { "source": "stdout" },
                            "matcher": { "kind": "includes", "expected": ["hub-vpc"] }
                        },
                        {
                            "description": "exit ok",
                            "subject": { "source": "exit_code" },
                            "matcher": { "kind": "equals", "expected": 0 }
                        }
                    ]
                }]
            },
            {
                "control_id": "spoke",
                "examples": [{
                    "example_id": "listed",
                    "command": "gcloud   list 'networks'",
                    "expectations": [{
                        "description": "spoke listed",
                        "subject": { "source": "stdout" },
                        "matcher": { "kind": "includes", "expected": ["spoke-vpc"] }
                    }]
                }]
            }
        ]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    assert_eq!(runner.calls("gcloud list networks"), 1);
    assert_eq!(runner.total_calls(), 1);
    assert_eq!(report.distinct_commands, 1);
    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(report.summary().expectations.passed, 3);
}

/// Verifies list literals decoded from suite JSON compare by value and length.
#[tokio::test]
async fn decoded_list_literals_compare_by_equality() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond("gcloud describe fw", exit(0, r#"{"targetTags":["egress-inet"]}"#, "")),
    );
    let spec = suite(json!({
        "controls": [{
            "control_id": "firewall",
            "examples": [{
                "example_id": "tags",
                "command": "gcloud describe fw",
                "expectations": [
                    {
                        "description": "tagged for egress",
                        "subject": { "source": "stdout", "path": "targetTags" },
                        "matcher": { "kind": "equals", "expected": ["egress-inet"] }
                    },
                    {
                        "description": "untagged",
                        "subject": { "source": "stdout", "path": "targetTags" },
                        "matcher": { "kind": "equals", "expected": [] }
                    },
                    {
                        "description": "reference-shaped element stays literal",
                        "subject": { "source": "stdout", "path": "targetTags" },
                        "matcher": { "kind": "not_includes", "expected": [{ "attribute": "egress-inet" }] }
                    }
                ]
            }]
        }]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    let [tagged, untagged, literal] = example(&report, 0, 0).expectations.as_slice() else {
        panic!("expected three expectations");
    };
    assert_eq!(tagged.outcome, Outcome::Passed);
    assert_eq!(untagged.outcome, Outcome::Failed);
    assert_eq!(
        untagged.failure.as_ref().unwrap().message,
        "list length mismatch at $: expected 0 elements, got 1"
    );
    assert_eq!(literal.outcome, Outcome::Passed);
}

/// Verifies a forbidden name prefix fails the negated pattern matcher.
#[tokio::test]
async fn forbidden_route_prefix_fails_not_matches_pattern() {
    let runner = Arc::new(
        ScriptedRunner::new().respond("gcloud list routes", exit(0, r#"[{"name":"default-route-123"}]"#, "")),
    );
    let spec = suite(json!({
        "controls": [{
            "control_id": "routes",
            "examples": [{
                "example_id": "no-default",
                "command": "gcloud list routes",
                "expectations": [{
                    "description": "no default route",
                    "subject": { "source": "stdout", "path": "[0].name" },
                    "matcher": { "kind": "not_matches_pattern", "pattern": "^default-route" }
                }]
            }]
        }]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    let expectation = &example(&report, 0, 0).expectations[0];
    assert_eq!(expectation.outcome, Outcome::Failed);
    assert_eq!(expectation.failure.as_ref().unwrap().message, "value matches pattern");
    assert_eq!(report.outcome, Outcome::Failed);
}

// ============================================================================
// SECTION: Filtered Lookup
// ============================================================================

fn peering_suite() -> SuiteSpec {
    let peering = "[0].peerings[?name==${peering.value.local_network_peering.name}]";
    suite(json!({
        "title": "network peering",
        "controls": [{
            "control_id": "gcloud",
            "for_each": { "attribute": "peerings", "bind": "peering" },
            "examples": [{
                "example_id": "local",
                "command": "gcloud compute networks peerings list --project=${project_id} --network=${peering.value.local_network_peering.network} --format=json",
                "expectations": [
                    {
                        "description": "exists",
                        "subject": { "source": "stdout", "path": peering },
                        "matcher": { "kind": "is_not_empty" }
                    },
                    {
                        "description": "active",
                        "subject": { "source": "stdout", "path": format!("{peering}.state") },
                        "matcher": { "kind": "equals", "expected": "ACTIVE" }
                    },
                    {
                        "description": "connected to peer network",
                        "subject": { "source": "stdout", "path": format!("{peering}.network") },
                        "matcher": {
                            "kind": "equals",
                            "expected": { "attribute": "peering.value.peer_network_peering.network" }
                        }
                    },
                    {
                        "description": "exports custom routes",
                        "subject": { "source": "stdout", "path": format!("{peering}.exportCustomRoutes") },
                        "matcher": { "kind": "equals", "expected": true }
                    },
                    {
                        "description": "does not import custom routes",
                        "subject": { "source": "stdout", "path": format!("{peering}.importCustomRoutes") },
                        "matcher": { "kind": "equals", "expected": false }
                    }
                ]
            }]
        }]
    }))
}

/// Verifies peerings are addressed by name through a bound filter operand.
#[tokio::test]
async fn peering_is_selected_by_bound_name() {
    let hub_listing = json!([{
        "name": "hub-vpc",
        "peerings": [
            { "name": "other", "state": "INACTIVE", "network": "x", "exportCustomRoutes": false, "importCustomRoutes": true },
            {
                "name": "hub-to-spoke",
                "state": "ACTIVE",
                "network": "projects/acme/global/networks/spoke-vpc",
                "exportCustomRoutes": true,
                "importCustomRoutes": false
            }
        ]
    }]);
    let spoke_listing = json!([{ "name": "spoke-vpc", "peerings": [] }]);
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond(
                "gcloud compute networks peerings list --project=acme --network=hub-vpc --format=json",
                exit(0, &hub_listing.to_string(), ""),
            )
            .respond(
                "gcloud compute networks peerings list --project=acme --network=spoke-vpc --format=json",
                exit(0, &spoke_listing.to_string(), ""),
            ),
    );
    let attrs = attributes(json!({
        "project_id": "acme",
        "peerings": {
            "hub": {
                "local_network_peering": { "name": "hub-to-spoke", "network": "hub-vpc" },
                "peer_network_peering": { "name": "spoke-to-hub", "network": "projects/acme/global/networks/spoke-vpc" }
            },
            "spoke": {
                "local_network_peering": { "name": "spoke-to-hub", "network": "spoke-vpc" },
                "peer_network_peering": { "name": "hub-to-spoke", "network": "projects/acme/global/networks/hub-vpc" }
            }
        }
    }));

    let report = engine(&runner, EngineConfig::default()).run(&peering_suite(), attrs).await.unwrap();

    let children = &report.controls[0].controls;
    assert_eq!(children[0].control_id.as_str(), "gcloud[hub]");
    let hub = &children[0].examples[0];
    assert!(hub.expectations.iter().all(|expectation| expectation.outcome == Outcome::Passed));
    assert_eq!(
        hub.expectations[1].subject,
        "stdout:[0].peerings[?name==${peering.value.local_network_peering.name}].state"
    );

    let spoke = &children[1].examples[0];
    assert_eq!(spoke.outcome, Outcome::Errored);
    let error = spoke.expectations[0].error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::InvalidPath);
    assert!(error.message.contains(r#"none of 0 elements has name == "spoke-to-hub""#), "{}", error.message);
    assert_eq!(runner.total_calls(), 2);
}

// ============================================================================
// SECTION: Iteration
// ============================================================================

/// Verifies each list element becomes a generated child with its own command.
#[tokio::test]
async fn list_iteration_generates_one_child_per_element() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond("gcloud describe a", exit(0, r#"{"purpose":"PRIVATE","region":"us-east1"}"#, ""))
            .respond("gcloud describe b", exit(0, r#"{"purpose":"PRIVATE","region":"us-west1"}"#, ""))
            .respond("gcloud describe c", exit(0, r#"{"purpose":"PUBLIC","region":"us-east1"}"#, "")),
    );
    let attrs = attributes(json!({
        "subnets": [
            { "name": "a", "region": "us-east1" },
            { "name": "b", "region": "us-west1" },
            { "name": "c", "region": "us-east1" }
        ]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&subnet_suite(), attrs).await.unwrap();

    let parent = &report.controls[0];
    let ids: Vec<&str> = parent.controls.iter().map(|child| child.control_id.as_str()).collect();
    assert_eq!(ids, ["subnets[0]", "subnets[1]", "subnets[2]"]);
    assert_eq!(parent.controls[0].binding, Some(json!({ "name": "a", "region": "us-east1" })));
    assert_eq!(parent.controls[0].outcome, Outcome::Passed);
    assert_eq!(parent.controls[1].outcome, Outcome::Passed);
    assert_eq!(parent.controls[2].outcome, Outcome::Failed);
    assert_eq!(parent.outcome, Outcome::Failed);
    assert_eq!(report.distinct_commands, 3);
    assert_eq!(runner.total_calls(), 3);

    let labels: Vec<String> = report.flatten().into_iter().map(|record| record.label).collect();
    assert_eq!(labels[0], "subnets/subnets[0]/describe#0");
    assert_eq!(labels.len(), 6);
}

/// Verifies mapping entries bind key and value.
#[tokio::test]
async fn mapping_iteration_binds_key_and_value() {
    let runner = Arc::new(ScriptedRunner::new());
    let spec = suite(json!({
        "controls": [{
            "control_id": "labels",
            "for_each": { "attribute": "labels", "bind": "label" },
            "examples": [{
                "example_id": "lowercase",
                "expectations": [{
                    "description": "value is lowercase",
                    "subject": { "source": "attribute", "path": "label.value" },
                    "matcher": { "kind": "matches_pattern", "pattern": "^[a-z]+$" }
                }]
            }]
        }]
    }));
    let attrs = attributes(json!({ "labels": { "env": "prod", "team": "NetOps" } }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attrs).await.unwrap();

    let children = &report.controls[0].controls;
    assert_eq!(children[0].control_id.as_str(), "labels[env]");
    assert_eq!(children[0].binding, Some(json!({ "key": "env", "value": "prod" })));
    assert_eq!(children[0].outcome, Outcome::Passed);
    assert_eq!(children[1].control_id.as_str(), "labels[team]");
    assert_eq!(children[1].outcome, Outcome::Failed);
    assert_eq!(runner.total_calls(), 0);
}

/// Verifies empty collections and non-collections.
#[tokio::test]
async fn iteration_over_empty_or_scalar_attributes() {
    let runner = Arc::new(ScriptedRunner::new());
    let engine = engine(&runner, EngineConfig::default());

    let report = engine.run(&subnet_suite(), attributes(json!({ "subnets": [] }))).await.unwrap();
    assert!(report.controls[0].controls.is_empty());
    assert_eq!(report.outcome, Outcome::Passed);

    let report = engine.run(&subnet_suite(), attributes(json!({ "subnets": "a,b" }))).await.unwrap();
    let control = &report.controls[0];
    assert_eq!(control.outcome, Outcome::Errored);
    let error = control.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::InvalidIteration);
    assert_eq!(error.message, "iteration attribute subnets is a string, expected a list or mapping");

    let report = engine.run(&subnet_suite(), attributes(json!({}))).await.unwrap();
    assert_eq!(report.controls[0].error.as_ref().unwrap().kind, ErrorKind::UnknownAttribute);
    assert_eq!(runner.total_calls(), 0);
}

// ============================================================================
// SECTION: Error Handling
// ============================================================================

/// Verifies plan nodes reach terminal states and cannot be evaluated twice.
#[tokio::test]
async fn evaluated_plans_record_node_states_and_refuse_a_second_run() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond("gcloud describe a", exit(0, r#"{"purpose":"PRIVATE","region":"us-east1"}"#, "")),
    );
    let engine = engine(&runner, EngineConfig::default());
    let attrs = attributes(json!({ "subnets": [{ "name": "a", "region": "us-east1" }] }));
    let mut plan = engine.plan(&subnet_suite(), attrs).unwrap();
    let child = &plan.controls[0].controls[0];
    assert_eq!(child.state, NodeState::Pending);
    assert_eq!(child.examples[0].expectations[0].state, NodeState::Pending);

    let report = engine.run_plan(&mut plan).await.unwrap();
    assert_eq!(report.outcome, Outcome::Passed);
    let parent = &plan.controls[0];
    assert_eq!(parent.state, NodeState::Passed);
    let example = &parent.controls[0].examples[0];
    assert_eq!(example.state, NodeState::Passed);
    assert!(example.expectations.iter().all(|expectation| expectation.state == NodeState::Passed));

    let err = engine.run_plan(&mut plan).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::State(StateError {
            from: NodeState::Passed,
            to: NodeState::Evaluating,
        })
    ));
    assert_eq!(runner.total_calls(), 1);

    let mut broken = engine.plan(&subnet_suite(), attributes(json!({ "subnets": "a,b" }))).unwrap();
    engine.run_plan(&mut broken).await.unwrap();
    assert_eq!(broken.controls[0].state, NodeState::Errored);
}

/// Verifies timeouts error every expectation of the example.
#[tokio::test]
async fn timeout_errors_all_expectations() {
    let runner = Arc::new(ScriptedRunner::new().respond("sleep 60", Scripted::Timeout));
    let spec = suite(json!({
        "controls": [{
            "control_id": "slow",
            "examples": [{
                "example_id": "hangs",
                "command": "sleep 60",
                "expectations": [
                    {
                        "description": "exit ok",
                        "subject": { "source": "exit_code" },
                        "matcher": { "kind": "equals", "expected": 0 }
                    },
                    {
                        "description": "quiet",
                        "subject": { "source": "stderr" },
                        "matcher": { "kind": "is_empty" }
                    }
                ]
            }]
        }]
    }));
    let config = EngineConfig {
        command_timeout: Duration::from_millis(250),
        ..EngineConfig::default()
    };

    let report = engine(&runner, config).run(&spec, attributes(json!({}))).await.unwrap();

    let example = example(&report, 0, 0);
    assert_eq!(example.outcome, Outcome::Errored);
    assert_eq!(example.error.as_ref().unwrap().kind, ErrorKind::CommandTimeout);
    assert!(example.command.as_ref().unwrap().timed_out);
    for expectation in &example.expectations {
        assert_eq!(expectation.outcome, Outcome::Errored);
        let error = expectation.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::CommandTimeout);
        assert_eq!(error.message, "command timed out after 250 ms (limit 250 ms)");
    }
}

/// Verifies spawn failures become command errors.
#[tokio::test]
async fn spawn_failure_errors_the_example() {
    let runner = Arc::new(ScriptedRunner::new().respond("missing-tool", Scripted::SpawnError));
    let spec = suite(json!({
        "controls": [{
            "control_id": "tooling",
            "examples": [{
                "example_id": "runs",
                "command": "missing-tool",
                "expectations": [{
                    "description": "exit ok",
                    "subject": { "source": "exit_code" },
                    "matcher": { "kind": "equals", "expected": 0 }
                }]
            }]
        }]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    let example = example(&report, 0, 0);
    assert!(example.command.is_none());
    let error = example.expectations[0].error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::CommandFailed);
    assert_eq!(error.message, "failed to spawn missing-tool: No such file or directory");
}

/// Verifies attribute problems surface as errored nodes, not aborted runs.
#[tokio::test]
async fn attribute_errors_are_localized() {
    let runner = Arc::new(ScriptedRunner::new().respond("echo ok", exit(0, "{}", "")));
    let spec = suite(json!({
        "controls": [
            {
                "control_id": "broken",
                "examples": [{
                    "example_id": "template",
                    "command": "gcloud describe ${region}",
                    "expectations": [{
                        "description": "exit ok",
                        "subject": { "source": "exit_code" },
                        "matcher": { "kind": "equals", "expected": 0 }
                    }]
                }]
            },
            {
                "control_id": "healthy",
                "examples": [{
                    "example_id": "echo",
                    "command": "echo ok",
                    "expectations": [
                        {
                            "description": "unknown operand",
                            "subject": { "source": "stdout" },
                            "matcher": { "kind": "equals", "expected": { "attribute": "zone" } }
                        },
                        {
                            "description": "empty object",
                            "subject": { "source": "stdout" },
                            "matcher": { "kind": "is_empty" }
                        }
                    ]
                }]
            }
        ]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    let broken = example(&report, 0, 0);
    assert_eq!(broken.error.as_ref().unwrap().kind, ErrorKind::UnknownAttribute);
    assert_eq!(broken.expectations[0].outcome, Outcome::Errored);

    let healthy = example(&report, 1, 0);
    assert_eq!(healthy.expectations[0].error.as_ref().unwrap().kind, ErrorKind::UnknownAttribute);
    assert_eq!(healthy.expectations[1].outcome, Outcome::Passed);
    assert_eq!(runner.total_calls(), 1);
    assert_eq!(report.summary().expectations.errored, 2);
}

/// Verifies malformed and truncated stdout handling.
#[tokio::test]
async fn malformed_output_errors_stdout_subjects_only() {
    let runner = Arc::new(ScriptedRunner::new().respond("gcloud list", exit(0, "Listed 0 items.", "")));
    let spec = suite(json!({
        "controls": [{
            "control_id": "listing",
            "examples": [{
                "example_id": "text",
                "command": "gcloud list",
                "expectations": [
                    {
                        "description": "empty list",
                        "subject": { "source": "stdout" },
                        "matcher": { "kind": "is_empty" }
                    },
                    {
                        "description": "exit ok",
                        "subject": { "source": "exit_code" },
                        "matcher": { "kind": "equals", "expected": 0 }
                    }
                ]
            }]
        }]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    let example = example(&report, 0, 0);
    assert_eq!(example.expectations[0].error.as_ref().unwrap().kind, ErrorKind::MalformedOutput);
    assert_eq!(example.expectations[1].outcome, Outcome::Passed);
}

/// Verifies matcher/type mismatches error instead of passing.
#[tokio::test]
async fn unsupported_matches_error() {
    let runner = Arc::new(ScriptedRunner::new().respond("gcloud count", exit(0, "3", "")));
    let spec = suite(json!({
        "controls": [{
            "control_id": "count",
            "examples": [{
                "example_id": "scalar",
                "command": "gcloud count",
                "expectations": [{
                    "description": "keys absent",
                    "subject": { "source": "stdout" },
                    "matcher": { "kind": "excludes_key", "key": "role" }
                }]
            }]
        }]
    }));

    let report = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap();

    let error = example(&report, 0, 0).expectations[0].error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::UnsupportedMatch);
}

/// Verifies invalid suites abort before any command is executed.
#[tokio::test]
async fn invalid_suite_is_fatal() {
    let runner = Arc::new(ScriptedRunner::new());
    let spec = suite(json!({
        "controls": [{ "control_id": "dup" }, { "control_id": "dup" }]
    }));

    let err = engine(&runner, EngineConfig::default()).run(&spec, attributes(json!({}))).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidSuite(_)));
    assert_eq!(runner.total_calls(), 0);
}

#[test]
fn invalid_config_is_rejected() {
    let runner: Arc<dyn CommandRunner> = Arc::new(ScriptedRunner::new());
    let config = EngineConfig {
        max_concurrency: 0,
        ..EngineConfig::default()
    };
    assert!(matches!(ComplianceEngine::new(Arc::clone(&runner), config), Err(EngineError::InvalidConfig(_))));

    let config = EngineConfig {
        command_timeout: Duration::ZERO,
        ..EngineConfig::default()
    };
    assert!(matches!(ComplianceEngine::new(runner, config), Err(EngineError::InvalidConfig(_))));
}

// ============================================================================
// SECTION: Configured Behavior
// ============================================================================

/// Verifies the optional stderr-emptiness check.
#[tokio::test]
async fn require_empty_stderr_adds_a_check() {
    let runner = Arc::new(ScriptedRunner::new().respond("gcloud get", exit(0, "{}", "WARNING: deprecated flag")));
    let spec = suite(json!({
        "controls": [{
            "control_id": "ctrl",
            "examples": [
                {
                    "example_id": "with_command",
                    "command": "gcloud get",
                    "expectations": [{
                        "description": "exit ok",
                        "subject": { "source": "exit_code" },
                        "matcher": { "kind": "equals", "expected": 0 }
                    }]
                },
                {
                    "example_id": "without_command",
                    "expectations": [{
                        "description": "attribute present",
                        "subject": { "source": "attribute", "path": "project" },
                        "matcher": { "kind": "equals", "expected": "acme" }
                    }]
                }
            ]
        }]
    }));
    let attrs = attributes(json!({ "project": "acme" }));

    let lenient = engine(&runner, EngineConfig::default()).run(&spec, Arc::clone(&attrs)).await.unwrap();
    assert_eq!(lenient.outcome, Outcome::Passed);

    let config = EngineConfig {
        require_empty_stderr: true,
        ..EngineConfig::default()
    };
    let strict = engine(&runner, config).run(&spec, attrs).await.unwrap();
    let with_command = example(&strict, 0, 0);
    assert_eq!(with_command.expectations.len(), 2);
    assert_eq!(with_command.expectations[1].description, "stderr is empty");
    assert_eq!(with_command.expectations[1].outcome, Outcome::Failed);
    assert_eq!(example(&strict, 0, 1).expectations.len(), 1);
    assert_eq!(strict.outcome, Outcome::Failed);
}

/// Verifies the concurrency bound and declaration-ordered reporting.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded_and_order_is_stable() {
    let mut runner = ScriptedRunner::new().with_delay(Duration::from_millis(20));
    let mut controls = Vec::new();
    for index in 0 .. 6 {
        let command = format!("check-route {index}");
        runner = runner.respond(&command, exit(0, "true", ""));
        controls.push(json!({
            "control_id": format!("c{index}"),
            "examples": [{
                "example_id": "route",
                "command": command,
                "expectations": [{
                    "description": "true",
                    "subject": { "source": "stdout" },
                    "matcher": { "kind": "equals", "expected": true }
                }]
            }]
        }));
    }
    let runner = Arc::new(runner);
    let config = EngineConfig {
        max_concurrency: 2,
        ..EngineConfig::default()
    };

    let report = engine(&runner, config)
        .run(&suite(json!({ "controls": controls })), attributes(json!({})))
        .await
        .unwrap();

    assert_eq!(runner.total_calls(), 6);
    assert!(runner.peak.load(Ordering::SeqCst) <= 2);
    let ids: Vec<&str> = report.controls.iter().map(|control: &ControlReport| control.control_id.as_str()).collect();
    assert_eq!(ids, ["c0", "c1", "c2", "c3", "c4", "c5"]);
    assert_eq!(report.outcome, Outcome::Passed);
}

/// Verifies audit events and report publication.
#[tokio::test]
async fn audit_events_and_publication() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond("gcloud describe a", exit(0, r#"{"purpose":"PRIVATE","region":"r"}"#, ""))
            .respond("gcloud describe b", exit(2, "", "denied")),
    );
    let audit = Arc::new(CapturingAudit::default());
    let sink = CollectingSink::default();
    let attrs = attributes(json!({ "subnets": [{ "name": "a", "region": "r" }, { "name": "b", "region": "r" }] }));

    let report = engine(&runner, EngineConfig::default())
        .with_audit_sink(Arc::clone(&audit) as Arc<dyn AuditSink>)
        .run_and_publish(&subnet_suite(), attrs, &sink)
        .await
        .unwrap();

    let commands = audit.commands.lock().unwrap();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|event| event.event == "command_executed"));
    assert!(commands.iter().all(|event| event.redaction == REDACTION_DIGEST_ONLY && event.command.is_none()));
    let describe_b = commands.iter().find(|event| event.exit_code == Some(2)).unwrap();
    assert_eq!(describe_b.examples, ["subnets/subnets[1]/describe"]);
    assert_eq!(describe_b.stderr_bytes, "denied".len());
    assert_ne!(commands[0].command_digest, commands[1].command_digest);

    let runs = audit.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].outcome, report.outcome);
    assert_eq!(runs[0].distinct_commands, 2);
    assert_eq!(runs[0].summary, report.summary());
    assert_eq!(runs[0].report_hash, Some(report.canonical_hash(EngineConfig::default().hash_algorithm).unwrap()));

    assert_eq!(sink.reports.lock().unwrap().as_slice(), [report]);
}

/// Verifies raw command text is logged only when enabled.
#[tokio::test]
async fn command_text_logging_is_opt_in() {
    let runner = Arc::new(ScriptedRunner::new().respond("echo ok", exit(0, "{}", "")));
    let audit = Arc::new(CapturingAudit::default());
    let spec = suite(json!({
        "controls": [{
            "control_id": "ctrl",
            "examples": [{ "example_id": "echo", "command": "echo ok" }]
        }]
    }));
    let config = EngineConfig {
        log_command_text: true,
        ..EngineConfig::default()
    };

    let report = engine(&runner, config)
        .with_audit_sink(Arc::clone(&audit) as Arc<dyn AuditSink>)
        .run(&spec, attributes(json!({})))
        .await
        .unwrap();

    let commands = audit.commands.lock().unwrap();
    assert_eq!(commands[0].command.as_deref(), Some("echo ok"));
    assert_eq!(commands[0].redaction, REDACTION_COMMAND_TEXT);
    assert_eq!(example(&report, 0, 0).outcome, Outcome::Passed);
    assert!(example(&report, 0, 0).expectations.is_empty());
}
