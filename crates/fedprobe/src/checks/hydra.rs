use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::Check;
use crate::config::ProbeSettings;
use crate::instance::{Endpoints, InstanceConfig};
use crate::metrics::{Metric, MetricValue, PartialResult};
use crate::transport::{HttpRequest, Transport};

#[derive(Deserialize)]
struct Alive {
    status: Option<String>,
}

/// Liveness of the OAuth provider in front of the school cloud.
pub struct HydraCheck {
    transport: Arc<dyn Transport>,
    settings: Arc<ProbeSettings>,
}

impl HydraCheck {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<ProbeSettings>) -> Self {
        Self { transport, settings }
    }
}

#[async_trait::async_trait]
impl Check for HydraCheck {
    fn name(&self) -> &'static str {
        "hydra"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::HydraAlive]
    }

    async fn run(&self, instance: &InstanceConfig) -> PartialResult {
        let url = Endpoints::resolve(instance, &self.settings).hydra_alive();

        let value = match self.transport.send(HttpRequest::get(url)).await {
            // Anything but {"status": "ok"} means the provider is up but unhealthy
            Ok(response) => {
                let alive = response.json::<Alive>().ok().and_then(|alive| alive.status);
                MetricValue::Bool(alive.as_deref() == Some("ok"))
            }
            Err(error) => {
                debug!("Hydra check on {} failed: {}", instance.key, error);
                MetricValue::Failed
            }
        };

        PartialResult::new().with(Metric::HydraAlive, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{ScriptedTransport, ok, settings, status};

    async fn run_with(transport: ScriptedTransport) -> Option<MetricValue> {
        let check = HydraCheck::new(Arc::new(transport), settings());
        check.run(&InstanceConfig::new("a")).await.get(Metric::HydraAlive).cloned()
    }

    #[tokio::test]
    async fn test_alive() {
        let transport = ScriptedTransport::default().route("/health/alive", |_| ok(r#"{"status":"ok"}"#));
        assert_eq!(run_with(transport).await, Some(MetricValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_unexpected_body() {
        let transport = ScriptedTransport::default().route("oauth.a.", |_| ok("<html>maintenance</html>"));
        assert_eq!(run_with(transport).await, Some(MetricValue::Bool(false)));
    }

    #[tokio::test]
    async fn test_request_failure() {
        let transport = ScriptedTransport::default().route("/health/alive", |_| status(503, ""));
        assert_eq!(run_with(transport).await, Some(MetricValue::Failed));
    }
}
