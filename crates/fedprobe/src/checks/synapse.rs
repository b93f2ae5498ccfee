//! Homeserver login and admin API checks.
//!
//! The admin calls need the token obtained by the login, so all three run
//! in one check: login first, then rooms and users concurrently. The token
//! lives only for the duration of [`SynapseCheck::run`].

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::Check;
use crate::config::ProbeSettings;
use crate::credentials::derive_password;
use crate::error::ProbeError;
use crate::instance::{Endpoints, InstanceConfig};
use crate::metrics::{Metric, MetricValue, PartialResult};
use crate::transport::{HttpRequest, Transport};

/// Admin token valid for one round
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct RoomList {
    total_rooms: Option<u64>,
}

#[derive(Deserialize)]
struct UserList {
    total: Option<u64>,
    users: Option<Vec<serde_json::Value>>,
}

pub struct SynapseCheck {
    transport: Arc<dyn Transport>,
    settings: Arc<ProbeSettings>,
}

impl SynapseCheck {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<ProbeSettings>) -> Self {
        Self { transport, settings }
    }

    /// Log in as the sync bot with its derived password.
    pub async fn login(
        &self,
        endpoints: &Endpoints,
        shared_secret: Option<&str>,
    ) -> Result<AccessToken, ProbeError> {
        let shared_secret = shared_secret
            .ok_or_else(|| ProbeError::Authentication("no shared secret configured".into()))?;

        let user_id = endpoints.sync_user_id();
        let password = derive_password(&user_id, shared_secret);
        let payload = json!({
            "type": "m.login.password",
            "user": user_id,
            "password": password,
        });

        let response = self
            .transport
            .send(HttpRequest::post_json(endpoints.login(), payload))
            .await
            .map_err(|error| match error {
                ProbeError::HttpStatus { status, .. } => {
                    ProbeError::Authentication(format!("login rejected with status {status}"))
                }
                other => other,
            })?;

        response
            .json::<LoginResponse>()?
            .access_token
            .map(AccessToken)
            .ok_or_else(|| ProbeError::Authentication("login response without access_token".into()))
    }

    /// Total number of rooms known to the homeserver
    pub async fn count_rooms(
        &self,
        endpoints: &Endpoints,
        token: &AccessToken,
    ) -> Result<u64, ProbeError> {
        let request = HttpRequest::get(endpoints.admin_rooms()).bearer(token.as_str());
        let rooms: RoomList = self.transport.send(request).await?.json()?;

        rooms.total_rooms.ok_or_else(|| ProbeError::InvalidResponse("total_rooms missing".into()))
    }

    /// Total number of users, counting the returned page when no total is given
    pub async fn count_users(
        &self,
        endpoints: &Endpoints,
        token: &AccessToken,
    ) -> Result<u64, ProbeError> {
        let request = HttpRequest::get(endpoints.admin_users()).bearer(token.as_str());
        let users: UserList = self.transport.send(request).await?.json()?;

        match (users.total, users.users) {
            (Some(total), _) if total > 0 => Ok(total),
            (_, Some(page)) => Ok(page.len() as u64),
            // A zero total with no page to fall back on is not a count
            (_, None) => Err(ProbeError::InvalidResponse("neither total nor users".into())),
        }
    }
}

fn count_or_failed(
    instance: &InstanceConfig,
    what: &str,
    result: &Result<u64, ProbeError>,
) -> MetricValue {
    match result {
        Ok(count) => MetricValue::Count(*count),
        Err(error) => {
            debug!("Counting {} on {} failed: {}", what, instance.key, error);
            MetricValue::Failed
        }
    }
}

#[async_trait::async_trait]
impl Check for SynapseCheck {
    fn name(&self) -> &'static str {
        "synapse"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::SyncConnection, Metric::CreatedRooms, Metric::CreatedUsers]
    }

    async fn run(&self, instance: &InstanceConfig) -> PartialResult {
        let endpoints = Endpoints::resolve(instance, &self.settings);
        let mut result = PartialResult::new();

        let provisioned = instance.access_token.clone().map(AccessToken::new);
        let token = match provisioned {
            Some(token) => token,
            None => match self.login(&endpoints, instance.shared_secret.as_deref()).await {
                Ok(token) => {
                    result.set(Metric::SyncConnection, true);
                    token
                }
                Err(error) => {
                    debug!("Login on {} failed: {}", instance.key, error);
                    // Admin metrics stay N/A: they were never attempted.
                    return result.with(Metric::SyncConnection, false);
                }
            },
        };

        let (rooms, users) = tokio::join!(
            self.count_rooms(&endpoints, &token),
            self.count_users(&endpoints, &token)
        );

        if instance.access_token.is_some() {
            result.set(Metric::SyncConnection, rooms.is_ok() || users.is_ok());
        }

        result.set(Metric::CreatedRooms, count_or_failed(instance, "rooms", &rooms));
        result.set(Metric::CreatedUsers, count_or_failed(instance, "users", &users));
        result
    }
}
