//! SSH reachability.
//!
//! libssh2 is blocking, so sessions are opened on the blocking pool and the
//! whole attempt is bounded by the same deadline as HTTP calls.

use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::Session;
use tokio::time::timeout;

use crate::error::ProbeError;

/// Where and as whom to log in
#[derive(Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// PEM encoded key or a path to one
    pub private_key: Option<String>,
}

impl fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait::async_trait]
pub trait SshConnector: Send + Sync {
    /// Open an authenticated session and close it again
    async fn connect(&self, target: &SshTarget) -> Result<(), ProbeError>;
}

/// libssh2 connector
pub struct Ssh2Connector {
    timeout_duration: Duration,
}

impl Ssh2Connector {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait::async_trait]
impl SshConnector for Ssh2Connector {
    async fn connect(&self, target: &SshTarget) -> Result<(), ProbeError> {
        let target = target.clone();
        let bound = self.timeout_duration;
        let attempt = tokio::task::spawn_blocking(move || open_session(&target, bound));

        // On expiry the blocking thread keeps running until libssh2's own
        // timeout fires; the caller is released right away.
        match timeout(bound, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ProbeError::Connect(join_error.to_string())),
            Err(_elapsed) => Err(ProbeError::Timeout(bound)),
        }
    }
}

fn connect_error(error: impl fmt::Display) -> ProbeError {
    ProbeError::Connect(error.to_string())
}

fn open_session(target: &SshTarget, bound: Duration) -> Result<(), ProbeError> {
    let private_key = target
        .private_key
        .as_deref()
        .ok_or_else(|| ProbeError::Connect("no private key configured".to_string()))?;

    let address = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(connect_error)?
        .next()
        .ok_or_else(|| ProbeError::Connect(format!("{} did not resolve", target.host)))?;

    let tcp = TcpStream::connect_timeout(&address, bound).map_err(connect_error)?;

    let mut session = Session::new().map_err(connect_error)?;
    session.set_timeout(u32::try_from(bound.as_millis()).unwrap_or(u32::MAX));
    session.set_tcp_stream(tcp);
    session.handshake().map_err(connect_error)?;

    let auth = if private_key.trim_start().starts_with("-----BEGIN") {
        session.userauth_pubkey_memory(&target.user, None, private_key, None)
    } else {
        session.userauth_pubkey_file(&target.user, None, Path::new(private_key), None)
    };
    auth.map_err(connect_error)?;

    let authenticated = session.authenticated();
    let _ = session.disconnect(None, "probe finished", None);

    if authenticated {
        Ok(())
    } else {
        Err(ProbeError::Connect(format!("{}@{} rejected the key", target.user, target.host)))
    }
}
