//! Content security policy check for the school front-end.
//!
//! The front-end must allow the messenger, embed and homeserver origins.
//! The metric counts their occurrences in the `content-security-policy`
//! header and reports `<found>/<expected>`.

use std::sync::Arc;

use tracing::debug;

use super::Check;
use crate::config::ProbeSettings;
use crate::error::ProbeError;
use crate::instance::{Endpoints, InstanceConfig};
use crate::metrics::{Metric, MetricValue, PartialResult};
use crate::transport::{HttpRequest, Transport};

const CSP_HEADER: &str = "content-security-policy";

/// Total occurrences of `origins` in `policy`
pub fn count_origins<S: AsRef<str>>(policy: &str, origins: &[S]) -> usize {
    origins.iter().map(|origin| policy.matches(origin.as_ref()).count()).sum()
}

/// `found/expected`, with `found` capped at `expected`
pub fn format_ratio(found: usize, expected: u32) -> String {
    let expected = expected as usize;
    format!("{}/{}", found.min(expected), expected)
}

pub struct CorsCheck {
    transport: Arc<dyn Transport>,
    settings: Arc<ProbeSettings>,
}

impl CorsCheck {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<ProbeSettings>) -> Self {
        Self { transport, settings }
    }

    async fn probe(&self, endpoints: &Endpoints) -> Result<String, ProbeError> {
        let response = self.transport.send(HttpRequest::get(endpoints.frontend_page())).await?;
        // A policy may arrive split over several field lines
        let policy =
            response.header_all(CSP_HEADER).ok_or(ProbeError::HeaderMissing(CSP_HEADER))?;

        let found = count_origins(&policy, &endpoints.expected_origins());
        if found > self.settings.expected_cors_origins as usize {
            debug!(
                "{} lists {} origins, more than the expected {}",
                endpoints.frontend, found, self.settings.expected_cors_origins
            );
        }

        Ok(format_ratio(found, self.settings.expected_cors_origins))
    }
}

#[async_trait::async_trait]
impl Check for CorsCheck {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::CorsHeaders]
    }

    async fn run(&self, instance: &InstanceConfig) -> PartialResult {
        let endpoints = Endpoints::resolve(instance, &self.settings);

        let value = match self.probe(&endpoints).await {
            Ok(ratio) => MetricValue::Text(ratio),
            Err(error) => {
                debug!("CORS check on {} failed: {}", instance.key, error);
                MetricValue::Failed
            }
        };

        PartialResult::new().with(Metric::CorsHeaders, value)
    }
}
