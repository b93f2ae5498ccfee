//! Outbound calls made by checks.
//!
//! Checks only see the [`Transport`] and [`SshConnector`] traits. The
//! production implementations are [`ReqwestTransport`] wrapped in a
//! [`Deadline`], and [`Ssh2Connector`].

pub mod http;
pub mod ssh;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ProbeError;

pub use http::ReqwestTransport;
pub use ssh::{Ssh2Connector, SshConnector, SshTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An HTTP request as issued by a check
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), headers: Vec::new(), json: None }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: Method::Post, url: url.into(), headers: Vec::new(), json: Some(body) }
    }

    /// Add a bearer `Authorization` header
    pub fn bearer(mut self, token: &str) -> Self {
        self.headers.push(("authorization".to_string(), format!("Bearer {token}")));
        self
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    /// Header names are lowercase
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive lookup; every field line of `name` joined with ", "
    pub fn header_all(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect();

        if values.is_empty() { None } else { Some(values.join(", ")) }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProbeError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-2xx response into [`ProbeError::HttpStatus`]
    pub fn error_for_status(self) -> Result<Self, ProbeError> {
        if (200..300).contains(&self.status) {
            Ok(self)
        } else {
            Err(ProbeError::HttpStatus { status: self.status, body: self.body })
        }
    }
}

/// HTTP client seen by checks.
///
/// Implementations resolve to `Ok` only for 2xx responses; anything else is
/// a [`ProbeError::HttpStatus`] carrying the body.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProbeError>;
}

/// Bounds every call of the inner transport by a hard deadline.
///
/// An expired call is dropped, which cancels the in-flight request.
pub struct Deadline<T> {
    inner: T,
    bound: Duration,
}

impl<T: Transport> Deadline<T> {
    pub fn new(inner: T, bound: Duration) -> Self {
        Self { inner, bound }
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for Deadline<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProbeError> {
        let url = request.url.clone();

        match timeout(self.bound, self.inner.send(request)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                debug!("Request to {} cancelled after {:?}", url, self.bound);
                Err(ProbeError::Timeout(self.bound))
            }
        }
    }
}

/// The production HTTP transport: reqwest bounded by `deadline`.
pub fn http_transport(deadline: Duration) -> Result<Arc<dyn Transport>, ProbeError> {
    Ok(Arc::new(Deadline::new(ReqwestTransport::new()?, deadline)))
}
