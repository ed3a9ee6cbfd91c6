//! Coverage report aggregation and persistence
//!
//! Nested structure: endpoint path → field → fault kind → attempt results.
//! Appends are atomic under a single lock, and every append is followed by a
//! full snapshot write to the report file. Snapshot-compute and file-write
//! happen under a dedicated write lock so concurrent recorders never
//! interleave partial writes or clobber a newer snapshot with an older one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::fault::FaultKind;

/// The persisted report shape: endpoint → field → fault kind → attempts.
pub type ReportTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<AttemptResult>>>>;

/// Outcome of one rerun of a test against one injected fault.
///
/// Immutable once created; appended to the report, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttemptResult {
    /// Name of the test that was rerun
    pub test: String,
    /// `true` when the rerun failed, i.e. the test's assertions detected the
    /// injected fault. A rerun that passes is a coverage gap.
    pub caught: bool,
    /// Failure message from the rerun, when caught
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptResult {
    /// A rerun that failed: the fault was detected.
    #[must_use]
    pub fn caught(test: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            caught: true,
            error: Some(error.into()),
        }
    }

    /// A rerun that passed: the fault slipped through the assertions.
    #[must_use]
    pub fn not_detected(test: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            caught: false,
            error: None,
        }
    }
}

/// Thread-safe coverage report with write-through persistence.
///
/// Constructed once at process start and shared by `Arc`; tests running on
/// independent threads append concurrently without lost updates.
pub struct CoverageReport {
    tree: Mutex<ReportTree>,
    output_path: PathBuf,
    // Serializes "compute snapshot, write file" so snapshots land in order
    write_guard: Mutex<()>,
}

impl CoverageReport {
    #[must_use]
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            tree: Mutex::new(ReportTree::new()),
            output_path: output_path.into(),
            write_guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Append one attempt under `endpoint → field → kind`, creating
    /// intermediate containers on first use, then persist a full snapshot.
    ///
    /// Appends only, in call order; an existing list is never overwritten.
    /// A failed snapshot write is logged and swallowed: the in-memory tree
    /// remains the source of truth for the rest of the process.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::EmptyKey`] when `endpoint` or `field` is blank,
    /// which indicates a miswired harness rather than a test outcome.
    pub fn record(
        &self,
        endpoint: &str,
        field: &str,
        kind: FaultKind,
        result: AttemptResult,
    ) -> Result<(), ReportError> {
        if endpoint.trim().is_empty() {
            return Err(ReportError::EmptyKey("endpoint"));
        }
        if field.trim().is_empty() {
            return Err(ReportError::EmptyKey("field"));
        }

        {
            let mut tree = self.tree.lock();
            tree.entry(endpoint.to_string())
                .or_default()
                .entry(field.to_string())
                .or_default()
                .entry(kind.name().to_string())
                .or_default()
                .push(result);
        }

        if let Err(e) = self.persist() {
            eprintln!("failed to save coverage report: {e}");
        }
        Ok(())
    }

    /// Deterministic JSON rendering of the full tree.
    pub fn to_json(&self) -> Result<String, ReportError> {
        let tree = self.tree.lock();
        serde_json::to_string_pretty(&*tree).map_err(|e| ReportError::Serialize(e.to_string()))
    }

    /// Clone of the current tree, for inspection.
    #[must_use]
    pub fn snapshot(&self) -> ReportTree {
        self.tree.lock().clone()
    }

    /// Read a previously persisted report from disk.
    pub fn load(path: &Path) -> Result<ReportTree, ReportError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReportError::Io(path.to_path_buf(), e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ReportError::Serialize(e.to_string()))
    }

    fn persist(&self) -> Result<(), ReportError> {
        let _guard = self.write_guard.lock();
        let json = self.to_json()?;
        std::fs::write(&self.output_path, json)
            .map_err(|e| ReportError::Io(self.output_path.clone(), e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report {0} cannot be empty")]
    EmptyKey(&'static str),
    #[error("report serialization failed: {0}")]
    Serialize(String),
    #[error("cannot write {0}: {1}")]
    Io(PathBuf, String),
}
