//! Fault catalog - the closed set of response corruptions the engine can inject

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::SimulatorConfig;

/// A kind of response corruption.
///
/// Declaration order is the matrix order: reports produced from identical
/// configuration list fault kinds in the same sequence on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Keep the key, replace its value with JSON null
    NullField,
    /// Remove the key entirely
    MissingField,
    /// Replace the value with one of an incompatible JSON type
    InvalidDataType,
    /// Replace the value with a same-type but out-of-range value
    InvalidValue,
    /// Serve the baseline body under a different HTTP method
    HttpMethodChange,
    /// Serve the baseline body with a changed status code
    StatusCodeChange,
    /// Delay the stubbed response without altering the body
    DelayInjection,
}

/// Whether a fault targets one body field or the response as a whole.
///
/// Field-scoped kinds run once per (field, kind) pair; response-scoped kinds
/// bypass the per-field loop and run once per test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultScope {
    Field,
    Response,
}

impl FaultKind {
    /// Every kind, in declaration (and therefore matrix) order.
    pub const ALL: [Self; 7] = [
        Self::NullField,
        Self::MissingField,
        Self::InvalidDataType,
        Self::InvalidValue,
        Self::HttpMethodChange,
        Self::StatusCodeChange,
        Self::DelayInjection,
    ];

    /// Stable name used as the report key for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NullField => "null_field",
            Self::MissingField => "missing_field",
            Self::InvalidDataType => "invalid_data_type",
            Self::InvalidValue => "invalid_value",
            Self::HttpMethodChange => "http_method_change",
            Self::StatusCodeChange => "status_code_change",
            Self::DelayInjection => "delay_injection",
        }
    }

    #[must_use]
    pub const fn scope(self) -> FaultScope {
        match self {
            Self::NullField | Self::MissingField | Self::InvalidDataType | Self::InvalidValue => {
                FaultScope::Field
            }
            Self::HttpMethodChange | Self::StatusCodeChange | Self::DelayInjection => {
                FaultScope::Response
            }
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kinds enabled by `config`, in declaration order.
///
/// A kind that is absent or disabled never enters the mutation matrix and
/// therefore never appears in the coverage report.
#[must_use]
pub fn enabled_faults(config: &SimulatorConfig) -> Vec<FaultKind> {
    FaultKind::ALL
        .into_iter()
        .filter(|kind| config.is_fault_enabled(*kind))
        .collect()
}
