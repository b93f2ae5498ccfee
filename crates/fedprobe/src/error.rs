//! Error types for probing and configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while probing a single endpoint.
///
/// These never leave a check: every check converts them into the failure
/// value of the metrics it owns.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The call did not finish before the transport deadline
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Connection, TLS or protocol level failure
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("unexpected status {status}")]
    HttpStatus { status: u16, body: String },

    /// Login was rejected or returned no usable token
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A static asset could not be fetched
    #[error("asset unreachable: {0}")]
    AssetUnreachable(String),

    /// A required response header was absent
    #[error("missing response header: {0}")]
    HeaderMissing(&'static str),

    /// Establishing a non-HTTP connection failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// A URL built from configuration did not parse
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Body could not be decoded into the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProbeError {
    /// Body of an error response, if the server sent one
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

/// Errors loading or validating configuration. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration path available (set XDG_CONFIG_HOME or HOME)")]
    PathUnavailable,

    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
