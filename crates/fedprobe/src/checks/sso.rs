//! SSO login redirect check.
//!
//! A homeserver without SSO answers the redirect endpoint with
//! `M_UNRECOGNIZED`; that is reported as `DISABLED`, not as a failure.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use super::Check;
use crate::config::ProbeSettings;
use crate::error::ProbeError;
use crate::instance::{Endpoints, InstanceConfig};
use crate::metrics::{Metric, MetricValue, PartialResult};
use crate::transport::{HttpRequest, Transport};

/// Whether `body` is exactly the homeserver's "unrecognized request" error
pub fn is_unrecognized(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|value| value == json!({ "errcode": "M_UNRECOGNIZED", "error": "Unrecognized request" }))
        .unwrap_or(false)
}

pub struct SsoCheck {
    transport: Arc<dyn Transport>,
    settings: Arc<ProbeSettings>,
}

impl SsoCheck {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<ProbeSettings>) -> Self {
        Self { transport, settings }
    }

    /// Final URL after following the redirect chain
    async fn follow(&self, endpoints: &Endpoints) -> Result<String, ProbeError> {
        let url = endpoints.sso_redirect(&self.settings.sso_redirect_url)?;
        let response = self.transport.send(HttpRequest::get(url)).await?;
        Ok(response.url)
    }
}

#[async_trait::async_trait]
impl Check for SsoCheck {
    fn name(&self) -> &'static str {
        "sso"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::Oauth]
    }

    async fn run(&self, instance: &InstanceConfig) -> PartialResult {
        let endpoints = Endpoints::resolve(instance, &self.settings);

        let value = match self.follow(&endpoints).await {
            Ok(final_url) => MetricValue::Text(final_url),
            Err(error) if error.response_body().is_some_and(is_unrecognized) => MetricValue::Disabled,
            Err(error) => {
                debug!("SSO check on {} failed: {}", instance.key, error);
                MetricValue::Failed
            }
        };

        PartialResult::new().with(Metric::Oauth, value)
    }
}
