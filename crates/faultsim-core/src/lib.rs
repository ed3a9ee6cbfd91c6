//! faultsim-core: Core types and mutation logic for response fault simulation
//!
//! This crate provides the captured request/response model, the fault
//! catalog, the mutation generator that derives corrupted response bodies,
//! and the thread-safe coverage report that records which injected faults a
//! test suite's assertions actually detect.

pub mod config;
pub mod fault;
pub mod mutation;
pub mod report;
pub mod response;

pub use config::{ConfigError, SimulatorConfig};
pub use fault::{FaultKind, FaultScope, enabled_faults};
pub use mutation::{MutationError, MutationGenerator};
pub use report::{AttemptResult, CoverageReport, ReportError, ReportTree};
pub use response::{
    CapturedRequest, CapturedResponse, FieldMap, MalformedBodyError, SerializationError,
    parse_field_map, serialize_field_map,
};
