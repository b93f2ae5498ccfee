use std::sync::Arc;

use tracing::debug;

use super::Check;
use crate::config::ProbeSettings;
use crate::error::ProbeError;
use crate::instance::{Endpoints, InstanceConfig};
use crate::metrics::{Metric, PartialResult};
use crate::transport::{HttpRequest, Transport};

/// Fetches the embed script without credentials.
pub struct EmbedCheck {
    transport: Arc<dyn Transport>,
    settings: Arc<ProbeSettings>,
}

impl EmbedCheck {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<ProbeSettings>) -> Self {
        Self { transport, settings }
    }

    async fn fetch(&self, url: String) -> Result<(), ProbeError> {
        self.transport
            .send(HttpRequest::get(url.clone()))
            .await
            .map(|_| ())
            .map_err(|error| ProbeError::AssetUnreachable(format!("{url}: {error}")))
    }
}

#[async_trait::async_trait]
impl Check for EmbedCheck {
    fn name(&self) -> &'static str {
        "embed"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::EmbedAccessible]
    }

    async fn run(&self, instance: &InstanceConfig) -> PartialResult {
        let url = Endpoints::resolve(instance, &self.settings).embed_script();

        let accessible = match self.fetch(url).await {
            Ok(()) => true,
            Err(error) => {
                debug!("Embed check on {} failed: {}", instance.key, error);
                false
            }
        };

        PartialResult::new().with(Metric::EmbedAccessible, accessible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{ScriptedTransport, ok, settings, status};
    use crate::metrics::MetricValue;

    #[tokio::test]
    async fn test_reachable_script() {
        let transport = Arc::new(ScriptedTransport::default().route("embed.a.", |_| ok("")));
        let result = EmbedCheck::new(transport, settings()).run(&InstanceConfig::new("a")).await;
        assert_eq!(result.get(Metric::EmbedAccessible), Some(&MetricValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_missing_script() {
        let transport = Arc::new(ScriptedTransport::default().route("/embed.js", |_| status(404, "")));
        let result = EmbedCheck::new(transport, settings()).run(&InstanceConfig::new("a")).await;
        assert_eq!(result.get(Metric::EmbedAccessible), Some(&MetricValue::Bool(false)));
    }
}
