//! Captured request/response model
//!
//! A test's first (baseline) run captures the real request and response at
//! the HTTP-client boundary. The response body is parsed once into a field
//! map; every mutation afterwards works on a defensive copy of that map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parsed top-level fields of a JSON object body.
pub type FieldMap = serde_json::Map<String, Value>;

/// The outbound request observed on a test's baseline run.
///
/// Immutable once captured; owned by the orchestrator for the duration of
/// one test's full baseline-plus-matrix cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// The real response received on a test's baseline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub raw_body: String,
    /// Top-level fields of `raw_body`; empty when the body is not an object
    pub field_map: FieldMap,
}

impl CapturedResponse {
    /// Build a response, parsing `raw_body` into its field map.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedBodyError`] when `raw_body` is not valid JSON at
    /// all. A valid non-object body (array, scalar) is not an error: the
    /// field map is left empty and the field-mutation matrix degenerates to
    /// zero iterations.
    pub fn from_raw(
        url: impl Into<String>,
        status: u16,
        headers: BTreeMap<String, String>,
        raw_body: impl Into<String>,
    ) -> Result<Self, MalformedBodyError> {
        let raw_body = raw_body.into();
        let field_map = parse_field_map(&raw_body)?;
        Ok(Self {
            url: url.into(),
            status,
            headers,
            raw_body,
            field_map,
        })
    }
}

/// Parse a body into its top-level field map.
///
/// Arrays and scalars parse to an empty map; only syntactically invalid
/// bodies fail.
pub fn parse_field_map(raw_body: &str) -> Result<FieldMap, MalformedBodyError> {
    let value: Value =
        serde_json::from_str(raw_body).map_err(|e| MalformedBodyError(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Ok(FieldMap::new()),
    }
}

/// Serialize a (possibly mutated) field map back to a response body.
///
/// Round-trips: parsing the output reproduces the same field map.
pub fn serialize_field_map(field_map: &FieldMap) -> Result<String, SerializationError> {
    serde_json::to_string_pretty(field_map).map_err(|e| SerializationError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("response body is not structured data: {0}")]
pub struct MalformedBodyError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("failed to serialize mutated body: {0}")]
pub struct SerializationError(pub String);
