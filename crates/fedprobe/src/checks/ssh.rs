use std::sync::Arc;

use tracing::debug;

use super::Check;
use crate::config::ProbeSettings;
use crate::instance::{Endpoints, InstanceConfig};
use crate::metrics::{Metric, PartialResult};
use crate::transport::{SshConnector, SshTarget};

/// Key based SSH login to the instance host.
pub struct SshCheck {
    connector: Arc<dyn SshConnector>,
    settings: Arc<ProbeSettings>,
}

impl SshCheck {
    pub fn new(connector: Arc<dyn SshConnector>, settings: Arc<ProbeSettings>) -> Self {
        Self { connector, settings }
    }

    pub fn target(&self, instance: &InstanceConfig) -> SshTarget {
        let host = instance
            .host
            .clone()
            .unwrap_or_else(|| Endpoints::resolve(instance, &self.settings).messenger);

        SshTarget {
            host,
            port: self.settings.ssh_port,
            user: instance.user.clone().unwrap_or_else(|| self.settings.ssh_user.clone()),
            private_key: instance.private_key.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Check for SshCheck {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::Ssh]
    }

    async fn run(&self, instance: &InstanceConfig) -> PartialResult {
        let target = self.target(instance);

        let reachable = match self.connector.connect(&target).await {
            Ok(()) => true,
            Err(error) => {
                debug!("SSH check on {} ({}) failed: {}", instance.key, target.host, error);
                false
            }
        };

        PartialResult::new().with(Metric::Ssh, reachable)
    }
}
