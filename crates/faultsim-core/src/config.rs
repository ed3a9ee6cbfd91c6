//! Simulator configuration: fault toggles, exclusions, and report output

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fault::FaultKind;

/// Default location of the persisted coverage report.
pub const DEFAULT_REPORT_PATH: &str = "fault_simulation_report.json";

/// Top-level simulator configuration.
///
/// Loaded from TOML, YAML, or JSON depending on file extension; consumed as
/// plain data by the fault catalog and the orchestrator's exclusion checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Per-kind enable flags
    pub faults: FaultToggles,

    /// Endpoint paths to skip entirely
    pub endpoints: EndpointRules,

    /// Test names to skip entirely
    pub tests: TestRules,

    /// Report output settings
    pub report: ReportConfig,
}

/// One enable flag per fault kind, plus the delay parameter.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FaultToggles {
    pub null_field: FaultToggle,
    pub missing_field: FaultToggle,
    pub invalid_data_type: FaultToggle,
    pub invalid_value: FaultToggle,
    pub http_method_change: FaultToggle,
    pub status_code_change: FaultToggle,
    pub delay_injection: DelayToggle,
}

impl Default for FaultToggles {
    fn default() -> Self {
        Self {
            null_field: FaultToggle { enabled: true },
            missing_field: FaultToggle { enabled: true },
            invalid_data_type: FaultToggle::default(),
            invalid_value: FaultToggle::default(),
            http_method_change: FaultToggle::default(),
            status_code_change: FaultToggle::default(),
            delay_injection: DelayToggle::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FaultToggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DelayToggle {
    pub enabled: bool,
    /// Milliseconds the stub waits before responding
    pub delay_ms: u64,
}

impl Default for DelayToggle {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EndpointRules {
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TestRules {
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format; only "json" is currently supported
    pub format: String,
    pub output_path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            output_path: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}

impl SimulatorConfig {
    /// Load config from file, dispatching on extension.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string())),
            "yml" | "yaml" => {
                serde_yml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            _ => toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Load from the first default location that exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".faultsim.toml", ".faultsim.yml", "faultsim.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Whether `kind` participates in the mutation matrix.
    #[must_use]
    pub fn is_fault_enabled(&self, kind: FaultKind) -> bool {
        match kind {
            FaultKind::NullField => self.faults.null_field.enabled,
            FaultKind::MissingField => self.faults.missing_field.enabled,
            FaultKind::InvalidDataType => self.faults.invalid_data_type.enabled,
            FaultKind::InvalidValue => self.faults.invalid_value.enabled,
            FaultKind::HttpMethodChange => self.faults.http_method_change.enabled,
            FaultKind::StatusCodeChange => self.faults.status_code_change.enabled,
            FaultKind::DelayInjection => self.faults.delay_injection.enabled,
        }
    }

    #[must_use]
    pub fn is_test_excluded(&self, test_name: &str) -> bool {
        self.tests.exclude.iter().any(|t| t == test_name)
    }

    #[must_use]
    pub fn is_endpoint_excluded(&self, endpoint: &str) -> bool {
        self.endpoints.exclude.iter().any(|e| e == endpoint)
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# faultsim configuration

# Which response corruptions to inject. Each rerun of a test sees exactly
# one of these applied to one response field (or to the response metadata
# for the method/status/delay kinds).
[faults.null_field]
enabled = true

[faults.missing_field]
enabled = true

[faults.invalid_data_type]
enabled = false

[faults.invalid_value]
enabled = false

[faults.http_method_change]
enabled = false

[faults.status_code_change]
enabled = false

[faults.delay_injection]
enabled = false
delay_ms = 1000

# Endpoints whose tests should never be rerun with faults
[endpoints]
exclude = []
# exclude = ["/health", "/metrics"]

# Test names to leave untouched
[tests]
exclude = []

[report]
format = "json"
output_path = "fault_simulation_report.json"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
