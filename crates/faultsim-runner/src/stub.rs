//! Stub injector - publishes mutated responses to a mock server
//!
//! The orchestrator only knows [`StubInjector::publish`]; making the *next*
//! outbound call to the path return the published content is the adapter's
//! concern. [`WireMockInjector`] targets a WireMock admin API;
//! [`InMemoryInjector`] backs the engine's own tests.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde_json::json;

/// A stand-in response to serve for the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubMapping {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Delay before the stub responds, for `delay_injection`
    pub delay_ms: Option<u64>,
}

/// Registers or replaces a stand-in response on the mock server.
pub trait StubInjector: Send + Sync {
    fn publish(&self, stub: &StubMapping) -> Result<(), StubError>;
}

/// Publishes stubs through a WireMock admin endpoint
/// (`POST {admin_base}/__admin/mappings`).
pub struct WireMockInjector {
    admin_base: String,
    client: reqwest::blocking::Client,
}

impl WireMockInjector {
    #[must_use]
    pub fn new(admin_base: impl Into<String>) -> Self {
        Self {
            admin_base: admin_base.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

/// WireMock mapping document for one stub.
fn mapping_payload(stub: &StubMapping) -> serde_json::Value {
    let mut response = json!({
        "status": stub.status,
        "headers": stub.headers,
        "body": stub.body,
    });
    if let Some(delay_ms) = stub.delay_ms {
        response["fixedDelayMilliseconds"] = json!(delay_ms);
    }
    json!({
        "request": {
            "method": stub.method,
            "urlPath": stub.path,
        },
        "response": response,
    })
}

impl StubInjector for WireMockInjector {
    fn publish(&self, stub: &StubMapping) -> Result<(), StubError> {
        let url = format!("{}/__admin/mappings", self.admin_base);
        let response = self
            .client
            .post(&url)
            .json(&mapping_payload(stub))
            .send()
            .map_err(|e| StubError::Publish {
                path: stub.path.clone(),
                reason: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StubError::Publish {
                path: stub.path.clone(),
                reason: format!("admin API returned {}", response.status()),
            })
        }
    }
}

/// In-process injector keyed by (method, path); the latest publish wins.
#[derive(Default)]
pub struct InMemoryInjector {
    stubs: Mutex<HashMap<(String, String), StubMapping>>,
}

impl InMemoryInjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stub currently registered for (method, path), if any.
    #[must_use]
    pub fn served(&self, method: &str, path: &str) -> Option<StubMapping> {
        self.stubs
            .lock()
            .get(&(method.to_uppercase(), path.to_string()))
            .cloned()
    }

    /// Number of registered stubs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stubs.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stubs.lock().is_empty()
    }
}

impl StubInjector for InMemoryInjector {
    fn publish(&self, stub: &StubMapping) -> Result<(), StubError> {
        self.stubs
            .lock()
            .insert((stub.method.to_uppercase(), stub.path.clone()), stub.clone());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("failed to publish stub for {path}: {reason}")]
    Publish { path: String, reason: String },
}
