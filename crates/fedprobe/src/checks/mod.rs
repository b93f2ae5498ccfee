//! Checks run against every instance.
//!
//! A check owns a fixed set of metrics and always reports them: failures are
//! folded into `FAILED`/`false` inside the check, so [`Check::run`] has no
//! error path.

pub mod cors;
pub mod embed;
pub mod hydra;
pub mod ssh;
pub mod sso;
pub mod synapse;

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::ProbeSettings;
use crate::error::ConfigError;
use crate::instance::InstanceConfig;
use crate::metrics::{Metric, PartialResult};
use crate::transport::{SshConnector, Transport};

pub use cors::CorsCheck;
pub use embed::EmbedCheck;
pub use hydra::HydraCheck;
pub use ssh::SshCheck;
pub use sso::SsoCheck;
pub use synapse::SynapseCheck;

#[async_trait::async_trait]
pub trait Check: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Metrics this check reports. No two checks in a set may share one.
    fn metrics(&self) -> &'static [Metric];

    /// Probe `instance`. Only metrics from [`Check::metrics`] are reported.
    async fn run(&self, instance: &InstanceConfig) -> PartialResult;
}

/// Check selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// Login, then room and user counts through the admin API
    Synapse,
    Embed,
    Cors,
    Hydra,
    Sso,
    Ssh,
}

impl CheckKind {
    pub const ALL: [CheckKind; 6] = [
        CheckKind::Synapse,
        CheckKind::Embed,
        CheckKind::Cors,
        CheckKind::Hydra,
        CheckKind::Sso,
        CheckKind::Ssh,
    ];
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckKind::Synapse => "synapse",
            CheckKind::Embed => "embed",
            CheckKind::Cors => "cors",
            CheckKind::Hydra => "hydra",
            CheckKind::Sso => "sso",
            CheckKind::Ssh => "ssh",
        };
        f.write_str(name)
    }
}

/// Checks of a round, with disjoint metric ownership.
#[derive(Clone)]
pub struct CheckSet {
    checks: Vec<Arc<dyn Check>>,
    metrics: Vec<Metric>,
}

impl CheckSet {
    /// Fails if two checks claim the same metric.
    pub fn new(checks: Vec<Arc<dyn Check>>) -> Result<Self, ConfigError> {
        let mut owned = BTreeSet::new();

        for check in &checks {
            for metric in check.metrics() {
                if !owned.insert(*metric) {
                    return Err(ConfigError::Invalid(format!(
                        "metric '{metric}' reported by more than one check (last: {})",
                        check.name()
                    )));
                }
            }
        }

        Ok(Self { checks, metrics: owned.into_iter().collect() })
    }

    /// Build the configured checks on top of the given transports.
    pub fn from_settings(
        settings: Arc<ProbeSettings>,
        transport: Arc<dyn Transport>,
        ssh: Arc<dyn SshConnector>,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut kinds = settings.checks.clone();
        kinds.retain(|kind| seen.insert(*kind));

        let checks = kinds
            .into_iter()
            .map(|kind| -> Arc<dyn Check> {
                match kind {
                    CheckKind::Synapse => {
                        Arc::new(SynapseCheck::new(transport.clone(), settings.clone()))
                    }
                    CheckKind::Embed => Arc::new(EmbedCheck::new(transport.clone(), settings.clone())),
                    CheckKind::Cors => Arc::new(CorsCheck::new(transport.clone(), settings.clone())),
                    CheckKind::Hydra => Arc::new(HydraCheck::new(transport.clone(), settings.clone())),
                    CheckKind::Sso => Arc::new(SsoCheck::new(transport.clone(), settings.clone())),
                    CheckKind::Ssh => Arc::new(SshCheck::new(ssh.clone(), settings.clone())),
                }
            })
            .collect();

        Self::new(checks)
    }

    pub fn checks(&self) -> &[Arc<dyn Check>] {
        &self.checks
    }

    /// Union of all owned metrics, in report order
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl fmt::Debug for CheckSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.checks.iter().map(|check| check.name())).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    struct Claims(&'static str, &'static [Metric]);

    #[async_trait::async_trait]
    impl Check for Claims {
        fn name(&self) -> &'static str {
            self.0
        }

        fn metrics(&self) -> &'static [Metric] {
            self.1
        }

        async fn run(&self, _instance: &InstanceConfig) -> PartialResult {
            PartialResult::new()
        }
    }

    #[test]
    fn test_check_set_rejects_shared_metric() {
        let checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(Claims("first", &[Metric::Ssh])),
            Arc::new(Claims("second", &[Metric::Oauth, Metric::Ssh])),
        ];
        assert!(matches!(CheckSet::new(checks), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_check_set_metrics_follow_report_order() {
        let checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(Claims("ssh", &[Metric::Ssh])),
            Arc::new(Claims("embed", &[Metric::EmbedAccessible])),
        ];
        let set = CheckSet::new(checks).unwrap();
        assert_eq!(set.metrics(), &[Metric::EmbedAccessible, Metric::Ssh]);
    }

    #[test]
    fn test_from_settings_builds_all_kinds() {
        let transport = Arc::new(testing::ScriptedTransport::default());
        let ssh = Arc::new(crate::transport::Ssh2Connector::new(std::time::Duration::from_secs(1)));
        let set = CheckSet::from_settings(testing::settings(), transport, ssh).unwrap();

        assert_eq!(set.len(), CheckKind::ALL.len());
        assert_eq!(set.metrics(), &Metric::ALL);
    }

    #[test]
    fn test_check_kind_names() {
        let kinds: Vec<CheckKind> = serde_json::from_str(r#"["synapse", "ssh"]"#).unwrap();
        assert_eq!(kinds, vec![CheckKind::Synapse, CheckKind::Ssh]);
        assert_eq!(CheckKind::Hydra.to_string(), "hydra");
    }
}
