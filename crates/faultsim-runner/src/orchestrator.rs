//! Simulation orchestrator
//!
//! Drives one test body through its full run cycle: one unmodified baseline
//! run that captures the real response, then one rerun per (field, fault
//! kind) pair against a published mutated response. A rerun that fails means
//! the test's assertions detected the fault; a rerun that passes is a
//! coverage gap. Only setup-class errors cross this module's boundary -
//! rerun outcomes of any kind are absorbed into the report.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;

use faultsim_core::{
    AttemptResult, CapturedRequest, CapturedResponse, CoverageReport, FaultKind, FaultScope,
    MutationGenerator, ReportError, SimulatorConfig, enabled_faults, serialize_field_map,
};

use crate::http::endpoint_path;
use crate::stub::{StubInjector, StubMapping};

/// Report field key for response-scoped faults (method, status, delay),
/// which corrupt the response as a whole rather than one body field.
pub const RESPONSE_FIELD: &str = "*";

/// Failure raised by one invocation of a test body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    pub message: String,
}

impl std::fmt::Display for TestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TestFailure {}

impl From<String> for TestFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for TestFailure {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Outcome of one invocation of a test body.
pub type TestOutcome = Result<(), TestFailure>;

/// Where a test currently is in its baseline-plus-matrix cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingBaseline,
    BaselineCaptured,
    RunningMatrix,
    MatrixComplete,
}

#[derive(Debug)]
struct RunState {
    phase: Phase,
    first_run: bool,
    request: Option<CapturedRequest>,
    response: Option<CapturedResponse>,
    current_mutated_body: Option<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: Phase::AwaitingBaseline,
            first_run: true,
            request: None,
            response: None,
            current_mutated_body: None,
        }
    }
}

/// Shared view of one test's in-flight simulation state.
///
/// Cloned into the outbound-call boundary (e.g. [`crate::ObservedClient`])
/// so it can capture the baseline and switch reruns over to the stub server.
/// The lock is never held across an invocation of the test body.
#[derive(Clone, Default)]
pub struct SimulationHandle {
    inner: Arc<Mutex<RunState>>,
}

impl SimulationHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` until the baseline run has completed.
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.inner.lock().first_run
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Record the baseline request/response observed at the call boundary.
    ///
    /// Only the first capture of a cycle is kept; calls during matrix reruns
    /// are ignored.
    pub fn capture(&self, request: CapturedRequest, response: CapturedResponse) {
        let mut state = self.inner.lock();
        if state.phase == Phase::AwaitingBaseline {
            state.request = Some(request);
            state.response = Some(response);
            state.phase = Phase::BaselineCaptured;
        }
    }

    /// The captured baseline, once [`Phase::BaselineCaptured`] is reached.
    #[must_use]
    pub fn baseline(&self) -> Option<(CapturedRequest, CapturedResponse)> {
        let state = self.inner.lock();
        match (&state.request, &state.response) {
            (Some(request), Some(response)) => Some((request.clone(), response.clone())),
            _ => None,
        }
    }

    /// The mutated body currently published for a rerun, if any.
    #[must_use]
    pub fn current_mutated_body(&self) -> Option<String> {
        self.inner.lock().current_mutated_body.clone()
    }

    pub(crate) fn begin_matrix(&self) {
        let mut state = self.inner.lock();
        state.first_run = false;
        state.phase = Phase::RunningMatrix;
    }

    pub(crate) fn set_mutated_body(&self, body: String) {
        self.inner.lock().current_mutated_body = Some(body);
    }

    pub(crate) fn complete(&self) {
        let mut state = self.inner.lock();
        state.phase = Phase::MatrixComplete;
        // Terminal state immediately resets for the next test
        *state = RunState::default();
    }

    pub(crate) fn reset(&self) {
        *self.inner.lock() = RunState::default();
    }
}

/// Setup-class failures of a simulation cycle.
///
/// These indicate a miswired harness, not a test outcome.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The unmodified baseline run itself failed; no matrix is attempted.
    #[error("baseline run failed: {0}")]
    BaselineFailed(TestFailure),
    /// The test body never triggered the outbound-call hook.
    #[error("no baseline response captured; the outbound-call hook never fired")]
    MissingBaseline,
    /// The baseline URL yields no usable endpoint path to stub.
    #[error("no routing target: cannot derive an endpoint path from `{0}`")]
    RoutingNotConfigured(String),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Owns the rerun matrix for every test routed through it.
///
/// Constructed once at process start and passed by reference to the
/// test-invocation boundary; per-test state lives in the [`SimulationHandle`].
pub struct Orchestrator {
    catalog: Vec<FaultKind>,
    delay_ms: u64,
    excluded_tests: HashSet<String>,
    excluded_endpoints: HashSet<String>,
    generator: MutationGenerator,
    stub: Arc<dyn StubInjector>,
    report: Arc<CoverageReport>,
    handle: SimulationHandle,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: &SimulatorConfig,
        stub: Arc<dyn StubInjector>,
        report: Arc<CoverageReport>,
    ) -> Self {
        Self {
            catalog: enabled_faults(config),
            delay_ms: config.faults.delay_injection.delay_ms,
            excluded_tests: config.tests.exclude.iter().cloned().collect(),
            excluded_endpoints: config.endpoints.exclude.iter().cloned().collect(),
            generator: MutationGenerator::new(),
            stub,
            report,
            handle: SimulationHandle::new(),
        }
    }

    /// Replace the mutation generator, e.g. to reproduce a seeded run.
    #[must_use]
    pub fn with_generator(mut self, generator: MutationGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Handle to wire into the outbound-call boundary.
    #[must_use]
    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn report(&self) -> &Arc<CoverageReport> {
        &self.report
    }

    /// Run one test through its baseline and full fault matrix.
    ///
    /// The baseline outcome is the caller's result: a failing baseline
    /// surfaces as [`SimulationError::BaselineFailed`] and skips the matrix.
    /// Rerun failures never propagate - they are classified as detected
    /// faults and recorded.
    ///
    /// # Errors
    ///
    /// Only setup-class errors: failing baseline, no captured baseline, no
    /// routable endpoint, or an invalid report key.
    pub fn on_test_invoked(
        &self,
        test_name: &str,
        body: &mut dyn FnMut() -> TestOutcome,
    ) -> Result<(), SimulationError> {
        self.handle.reset();

        println!("running baseline for `{test_name}`");
        if let Err(failure) = invoke_guarded(body) {
            self.handle.reset();
            return Err(SimulationError::BaselineFailed(failure));
        }

        let Some((request, response)) = self.handle.baseline() else {
            self.handle.reset();
            return Err(SimulationError::MissingBaseline);
        };

        let endpoint = endpoint_path(&request.url).ok_or_else(|| {
            self.handle.reset();
            SimulationError::RoutingNotConfigured(request.url.clone())
        })?;

        if self.excluded_tests.contains(test_name) || self.excluded_endpoints.contains(&endpoint) {
            println!("`{test_name}` on {endpoint} is excluded; skipping fault matrix");
            self.handle.complete();
            return Ok(());
        }

        self.handle.begin_matrix();
        let outcome = self.run_matrix(test_name, &endpoint, &request, &response, body);
        self.handle.complete();
        outcome?;

        println!("all executions (baseline + simulated faults) completed for `{test_name}`");
        Ok(())
    }

    fn run_matrix(
        &self,
        test_name: &str,
        endpoint: &str,
        request: &CapturedRequest,
        response: &CapturedResponse,
        body: &mut dyn FnMut() -> TestOutcome,
    ) -> Result<(), SimulationError> {
        for field in response.field_map.keys() {
            for &kind in self
                .catalog
                .iter()
                .filter(|kind| kind.scope() == FaultScope::Field)
            {
                let mutated = match self.generator.mutate(&response.field_map, field, kind) {
                    Ok(mutated) => mutated,
                    Err(e) => {
                        eprintln!("skipping {kind} on `{field}`: {e}");
                        continue;
                    }
                };
                // A mutation that leaves the baseline unchanged (e.g.
                // null_field on an already-null value) would rerun the test
                // against the real response; nothing to detect, nothing to
                // record.
                if mutated == response.field_map {
                    eprintln!("skipping {kind} on `{field}`: baseline value is unaffected");
                    continue;
                }
                let mutated_body = match serialize_field_map(&mutated) {
                    Ok(body) => body,
                    Err(e) => {
                        eprintln!("skipping {kind} on `{field}`: {e}");
                        continue;
                    }
                };
                self.handle.set_mutated_body(mutated_body.clone());

                let stub = StubMapping {
                    method: request.method.clone(),
                    path: endpoint.to_string(),
                    status: response.status,
                    headers: json_headers(),
                    body: mutated_body,
                    delay_ms: None,
                };
                if let Err(e) = self.stub.publish(&stub) {
                    eprintln!("skipping {kind} on `{field}`: {e}");
                    continue;
                }

                let attempt = run_attempt(test_name, field, kind, body);
                self.report.record(endpoint, field, kind, attempt)?;
            }
        }

        for &kind in self
            .catalog
            .iter()
            .filter(|kind| kind.scope() == FaultScope::Response)
        {
            let stub = self.response_stub(kind, endpoint, request, response);
            if let Err(e) = self.stub.publish(&stub) {
                eprintln!("skipping {kind}: {e}");
                continue;
            }

            let attempt = run_attempt(test_name, RESPONSE_FIELD, kind, body);
            self.report.record(endpoint, RESPONSE_FIELD, kind, attempt)?;
        }

        Ok(())
    }

    /// Stub for a fault that corrupts response metadata instead of a field.
    fn response_stub(
        &self,
        kind: FaultKind,
        endpoint: &str,
        request: &CapturedRequest,
        response: &CapturedResponse,
    ) -> StubMapping {
        let mut stub = StubMapping {
            method: request.method.clone(),
            path: endpoint.to_string(),
            status: response.status,
            headers: json_headers(),
            body: response.raw_body.clone(),
            delay_ms: None,
        };
        match kind {
            FaultKind::HttpMethodChange => stub.method = flipped_method(&request.method),
            FaultKind::StatusCodeChange => {
                stub.status = if response.status < 500 { 500 } else { 200 };
            }
            FaultKind::DelayInjection => stub.delay_ms = Some(self.delay_ms),
            _ => {}
        }
        stub
    }
}

/// Invoke the test body, containing unwinds: real assertion macros panic
/// rather than return `Err`, and a panic must not escape the matrix loop.
fn invoke_guarded(body: &mut dyn FnMut() -> TestOutcome) -> TestOutcome {
    match std::panic::catch_unwind(AssertUnwindSafe(|| body())) {
        Ok(outcome) => outcome,
        Err(payload) => Err(TestFailure::from(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test body panicked".to_string()
    }
}

/// One rerun against a published fault, classified by outcome: a failing
/// rerun means the test's assertions caught the corruption.
fn run_attempt(
    test_name: &str,
    field: &str,
    kind: FaultKind,
    body: &mut dyn FnMut() -> TestOutcome,
) -> AttemptResult {
    println!("rerunning `{test_name}` with {kind} on `{field}`");
    match invoke_guarded(body) {
        Ok(()) => {
            eprintln!("[FAULT NOT DETECTED] `{test_name}` passed with {kind} on `{field}`");
            AttemptResult::not_detected(test_name)
        }
        Err(failure) => {
            println!(
                "[FAULT DETECTED] `{test_name}` failed with {kind} on `{field}`: {}",
                failure.message
            );
            AttemptResult::caught(test_name, failure.message)
        }
    }
}

fn flipped_method(method: &str) -> String {
    if method.eq_ignore_ascii_case("GET") {
        "POST".to_string()
    } else {
        "GET".to_string()
    }
}

fn json_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{InMemoryInjector, StubError};
    use serde_json::json;
    use std::collections::BTreeMap;

    const ENDPOINT: &str = "/posts/1";
    const URL: &str = "https://api.example.com/posts/1";

    fn fixture(
        config: &SimulatorConfig,
        dir: &tempfile::TempDir,
    ) -> (Orchestrator, Arc<InMemoryInjector>, Arc<CoverageReport>) {
        let injector = Arc::new(InMemoryInjector::new());
        let report = Arc::new(CoverageReport::new(dir.path().join("report.json")));
        let orchestrator = Orchestrator::new(
            config,
            Arc::clone(&injector) as Arc<dyn StubInjector>,
            Arc::clone(&report),
        );
        (orchestrator, injector, report)
    }

    fn capture_baseline(handle: &SimulationHandle, body_json: &str) {
        let request = CapturedRequest {
            method: "GET".to_string(),
            url: URL.to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let response =
            CapturedResponse::from_raw(URL, 200, BTreeMap::new(), body_json).unwrap();
        handle.capture(request, response);
    }

    #[test]
    fn two_fields_two_kinds_records_four_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default(); // null_field + missing_field
        let (orchestrator, injector, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        let mut body = || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1, "name": "a"}"#);
                return Ok(());
            }
            // Rerun: never detect anything
            Ok(())
        };
        orchestrator.on_test_invoked("lenient_test", &mut body).unwrap();

        let tree = report.snapshot();
        let fields = &tree[ENDPOINT];
        assert_eq!(fields.len(), 2);
        for field in ["id", "name"] {
            let kinds = &fields[field];
            assert_eq!(kinds.len(), 2);
            assert_eq!(kinds["null_field"].len(), 1);
            assert_eq!(kinds["missing_field"].len(), 1);
            assert!(!kinds["null_field"][0].caught);
        }
        // Field-scoped stubs all share the baseline method and path
        assert_eq!(injector.len(), 1);
    }

    #[test]
    fn excluded_test_runs_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulatorConfig::default();
        config.tests.exclude.push("skipped_test".to_string());
        let (orchestrator, injector, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        let mut invocations = 0;
        let mut body = || {
            invocations += 1;
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1}"#);
            }
            Ok(())
        };
        orchestrator.on_test_invoked("skipped_test", &mut body).unwrap();

        assert_eq!(invocations, 1); // baseline only
        assert!(report.snapshot().is_empty());
        assert!(injector.is_empty());
    }

    #[test]
    fn excluded_endpoint_runs_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulatorConfig::default();
        config.endpoints.exclude.push(ENDPOINT.to_string());
        let (orchestrator, _, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        let mut body = || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1}"#);
            }
            Ok(())
        };
        orchestrator.on_test_invoked("any_test", &mut body).unwrap();

        assert!(report.snapshot().is_empty());
    }

    #[test]
    fn missing_baseline_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default();
        let (orchestrator, _, _) = fixture(&config, &dir);

        // Body never triggers the outbound-call hook
        let mut body = || Ok(());
        let err = orchestrator.on_test_invoked("no_http_test", &mut body).unwrap_err();
        assert!(matches!(err, SimulationError::MissingBaseline));
        assert!(orchestrator.handle().is_first_run());
    }

    #[test]
    fn failing_baseline_propagates_and_skips_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default();
        let (orchestrator, _, report) = fixture(&config, &dir);

        let mut invocations = 0;
        let mut body = || {
            invocations += 1;
            Err(TestFailure::from("real regression"))
        };
        let err = orchestrator.on_test_invoked("broken_test", &mut body).unwrap_err();

        assert!(matches!(err, SimulationError::BaselineFailed(f) if f.message == "real regression"));
        assert_eq!(invocations, 1);
        assert!(report.snapshot().is_empty());
    }

    #[test]
    fn array_baseline_degenerates_to_zero_field_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default();
        let (orchestrator, _, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        let mut body = || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"[{"id": 1}, {"id": 2}]"#);
            }
            Ok(())
        };
        orchestrator.on_test_invoked("list_test", &mut body).unwrap();

        assert!(report.snapshot().is_empty());
    }

    #[test]
    fn status_code_change_serves_500_once_per_test() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulatorConfig::default();
        config.faults.null_field.enabled = false;
        config.faults.missing_field.enabled = false;
        config.faults.status_code_change.enabled = true;
        let (orchestrator, injector, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();
        let injector_view = Arc::clone(&injector);

        let mut body = move || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1}"#);
                return Ok(());
            }
            let served = injector_view.served("GET", ENDPOINT).unwrap();
            if served.status >= 500 {
                return Err("server error".into());
            }
            Ok(())
        };
        orchestrator.on_test_invoked("status_test", &mut body).unwrap();

        let tree = report.snapshot();
        let attempts = &tree[ENDPOINT][RESPONSE_FIELD]["status_code_change"];
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].caught);
        assert_eq!(attempts[0].error.as_deref(), Some("server error"));
    }

    #[test]
    fn method_change_registers_stub_under_flipped_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulatorConfig::default();
        config.faults.null_field.enabled = false;
        config.faults.missing_field.enabled = false;
        config.faults.http_method_change.enabled = true;
        let (orchestrator, injector, _) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        let mut body = || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1}"#);
            }
            Ok(())
        };
        orchestrator.on_test_invoked("method_test", &mut body).unwrap();

        assert!(injector.served("POST", ENDPOINT).is_some());
        assert!(injector.served("GET", ENDPOINT).is_none());
    }

    #[test]
    fn delay_injection_carries_configured_delay() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulatorConfig::default();
        config.faults.null_field.enabled = false;
        config.faults.missing_field.enabled = false;
        config.faults.delay_injection.enabled = true;
        config.faults.delay_injection.delay_ms = 250;
        let (orchestrator, injector, _) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        let mut body = || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1}"#);
            }
            Ok(())
        };
        orchestrator.on_test_invoked("delay_test", &mut body).unwrap();

        let served = injector.served("GET", ENDPOINT).unwrap();
        assert_eq!(served.delay_ms, Some(250));
        assert_eq!(served.body, r#"{"id": 1}"#); // body untouched
    }

    #[test]
    fn published_stub_matches_current_mutated_body() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulatorConfig::default();
        config.faults.missing_field.enabled = false; // null_field only
        let (orchestrator, injector, _) = fixture(&config, &dir);
        let handle = orchestrator.handle();
        let handle_view = orchestrator.handle();
        let injector_view = Arc::clone(&injector);

        let mut served_body = None;
        let mut mutated_at_serve = None;
        let mut body = || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1}"#);
                return Ok(());
            }
            served_body = injector_view.served("GET", ENDPOINT).map(|s| s.body);
            mutated_at_serve = handle_view.current_mutated_body();
            Ok(())
        };
        orchestrator.on_test_invoked("nulled_test", &mut body).unwrap();

        let served = served_body.unwrap();
        assert_eq!(Some(served.clone()), mutated_at_serve);
        let map = faultsim_core::parse_field_map(&served).unwrap();
        assert_eq!(map.get("id"), Some(&json!(null)));
    }

    #[test]
    fn state_resets_after_each_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default();
        let (orchestrator, _, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        for _ in 0..2 {
            let mut body = || {
                if handle.is_first_run() {
                    capture_baseline(&handle, r#"{"id": 1}"#);
                }
                Ok(())
            };
            orchestrator.on_test_invoked("repeat_test", &mut body).unwrap();
            assert!(handle.is_first_run());
            assert_eq!(handle.phase(), Phase::AwaitingBaseline);
            assert!(handle.current_mutated_body().is_none());
        }

        // Two cycles append, never overwrite
        let tree = report.snapshot();
        assert_eq!(tree[ENDPOINT]["id"]["null_field"].len(), 2);
    }

    #[test]
    fn panicking_assertions_are_absorbed_and_recorded_as_caught() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default();
        let (orchestrator, injector, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();
        let injector_view = Arc::clone(&injector);

        // Asserts with assert_eq!, the way a real test body fails: by
        // panicking, not by returning Err.
        let mut body = move || {
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1, "name": "a"}"#);
                return Ok(());
            }
            let served = injector_view.served("GET", ENDPOINT).unwrap();
            let map = faultsim_core::parse_field_map(&served.body).unwrap();
            assert_eq!(map.get("id"), Some(&json!(1)), "expected id == 1");
            Ok(())
        };
        orchestrator
            .on_test_invoked("asserting_test", &mut body)
            .unwrap();

        let tree = report.snapshot();
        let fields = &tree[ENDPOINT];
        // Mutating `id` panics the assertion; both attempts land as detections
        for kind in ["null_field", "missing_field"] {
            let attempts = &fields["id"][kind];
            assert_eq!(attempts.len(), 1);
            assert!(attempts[0].caught);
            assert!(
                attempts[0]
                    .error
                    .as_deref()
                    .unwrap()
                    .contains("expected id == 1")
            );
        }
        // Mutating `name` leaves `id` intact and the assertion passes
        for kind in ["null_field", "missing_field"] {
            assert!(!fields["name"][kind][0].caught);
        }
    }

    #[test]
    fn panicking_baseline_surfaces_as_baseline_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default();
        let (orchestrator, injector, report) = fixture(&config, &dir);

        let mut invocations = 0;
        let mut body = || -> TestOutcome {
            invocations += 1;
            panic!("fixture server unreachable")
        };
        let err = orchestrator
            .on_test_invoked("broken_setup_test", &mut body)
            .unwrap_err();

        assert!(
            matches!(err, SimulationError::BaselineFailed(f) if f.message == "fixture server unreachable")
        );
        assert_eq!(invocations, 1);
        assert!(report.snapshot().is_empty());
        assert!(injector.is_empty());
        assert!(orchestrator.handle().is_first_run());
    }

    /// Injector that rejects any stub whose body contains a marker string.
    struct RejectingInjector {
        inner: InMemoryInjector,
        marker: &'static str,
    }

    impl StubInjector for RejectingInjector {
        fn publish(&self, stub: &StubMapping) -> Result<(), StubError> {
            if stub.body.contains(self.marker) {
                return Err(StubError::Publish {
                    path: stub.path.clone(),
                    reason: "admin API returned 500".to_string(),
                });
            }
            self.inner.publish(stub)
        }
    }

    #[test]
    fn rejected_stub_skips_that_attempt_but_finishes_the_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::default(); // null_field + missing_field
        let injector = Arc::new(RejectingInjector {
            inner: InMemoryInjector::new(),
            marker: r#""id": null"#,
        });
        let report = Arc::new(CoverageReport::new(dir.path().join("report.json")));
        let orchestrator = Orchestrator::new(
            &config,
            Arc::clone(&injector) as Arc<dyn StubInjector>,
            Arc::clone(&report),
        );
        let handle = orchestrator.handle();

        let mut invocations = 0;
        let mut body = || {
            invocations += 1;
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1, "name": "a"}"#);
            }
            Ok(())
        };
        orchestrator
            .on_test_invoked("isolated_test", &mut body)
            .unwrap();

        // Baseline plus three reruns: null_field on `id` never publishes,
        // so its rerun never happens and nothing is recorded for it
        assert_eq!(invocations, 4);
        let tree = report.snapshot();
        let fields = &tree[ENDPOINT];
        assert!(!fields["id"].contains_key("null_field"));
        assert_eq!(fields["id"]["missing_field"].len(), 1);
        assert_eq!(fields["name"].len(), 2);
    }

    #[test]
    fn null_valued_field_skips_faults_that_cannot_change_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulatorConfig::default();
        config.faults.invalid_value.enabled = true;
        let (orchestrator, _, report) = fixture(&config, &dir);
        let handle = orchestrator.handle();

        let mut invocations = 0;
        let mut body = || {
            invocations += 1;
            if handle.is_first_run() {
                capture_baseline(&handle, r#"{"id": 1, "note": null}"#);
            }
            Ok(())
        };
        orchestrator
            .on_test_invoked("null_note_test", &mut body)
            .unwrap();

        // null_field and invalid_value cannot alter an already-null value;
        // only missing_field reruns against `note`
        assert_eq!(invocations, 1 + 3 + 1);
        let tree = report.snapshot();
        let fields = &tree[ENDPOINT];
        assert_eq!(fields["id"].len(), 3);
        let note_kinds = &fields["note"];
        assert_eq!(note_kinds.len(), 1);
        assert!(note_kinds.contains_key("missing_field"));
    }
}
