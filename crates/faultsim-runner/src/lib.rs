//! faultsim-runner: drives a test body through its fault-injection matrix
//!
//! Reruns a captured test against systematically corrupted responses served
//! by a stub server, and records which corruptions the test's assertions
//! detect.

pub mod http;
pub mod orchestrator;
pub mod stub;

pub use http::{HttpClient, HttpError, ObservedClient, ReqwestClient};
pub use orchestrator::{
    Orchestrator, Phase, RESPONSE_FIELD, SimulationError, SimulationHandle, TestFailure,
    TestOutcome,
};
pub use stub::{InMemoryInjector, StubError, StubInjector, StubMapping, WireMockInjector};
