//! Thin HTTP-client seam
//!
//! The engine never knows which concrete client a test uses: it only sees
//! [`HttpClient`]. The external boundary wraps the real client in an
//! [`ObservedClient`], which captures the baseline request/response on a
//! test's first run and redirects every rerun to the stub server.

use std::collections::BTreeMap;

use reqwest::Url;

use faultsim_core::{CapturedRequest, CapturedResponse, MalformedBodyError};

use crate::orchestrator::SimulationHandle;

/// Capability to issue one request and receive one response.
pub trait HttpClient: Send + Sync {
    fn send(&self, request: &CapturedRequest) -> Result<CapturedResponse, HttpError>;
}

/// Blocking reqwest-backed client.
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &CapturedRequest) -> Result<CapturedResponse, HttpError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| HttpError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.inner.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.to_string(), value.to_string());
            }
        }
        let body = response
            .text()
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        CapturedResponse::from_raw(url, status, headers, body).map_err(HttpError::from)
    }
}

/// Wraps a concrete client with capture-and-redirect behavior.
///
/// First run: forward to the real URL, hand the captured request/response to
/// the simulation handle. Reruns: rewrite the URL authority to the stub
/// server so the test receives the currently published mutated body.
pub struct ObservedClient<C> {
    inner: C,
    handle: SimulationHandle,
    stub_base: String,
}

impl<C> ObservedClient<C> {
    pub fn new(inner: C, handle: SimulationHandle, stub_base: impl Into<String>) -> Self {
        Self {
            inner,
            handle,
            stub_base: stub_base.into(),
        }
    }
}

impl<C: HttpClient> HttpClient for ObservedClient<C> {
    fn send(&self, request: &CapturedRequest) -> Result<CapturedResponse, HttpError> {
        if self.handle.is_first_run() {
            let response = self.inner.send(request)?;
            self.handle.capture(request.clone(), response.clone());
            Ok(response)
        } else {
            let redirected = redirect_to_stub(request, &self.stub_base)?;
            self.inner.send(&redirected)
        }
    }
}

/// Rewrite a request URL onto the stub server, keeping path and query.
pub(crate) fn redirect_to_stub(
    request: &CapturedRequest,
    stub_base: &str,
) -> Result<CapturedRequest, HttpError> {
    let original = Url::parse(&request.url)
        .map_err(|e| HttpError::InvalidUrl(request.url.clone(), e.to_string()))?;
    let mut target = Url::parse(stub_base)
        .map_err(|e| HttpError::InvalidUrl(stub_base.to_string(), e.to_string()))?;
    target.set_path(original.path());
    target.set_query(original.query());

    let mut redirected = request.clone();
    redirected.url = target.to_string();
    Ok(redirected)
}

/// Endpoint path of a captured URL, used as the report key.
pub(crate) fn endpoint_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),
    #[error("invalid url `{0}`: {1}")]
    InvalidUrl(String, String),
    #[error(transparent)]
    Body(#[from] MalformedBodyError),
}
