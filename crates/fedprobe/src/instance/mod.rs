//! Probed instances and the endpoints derived from them.

pub mod registry;

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::config::ProbeSettings;
use crate::error::ProbeError;

pub use registry::{filter_instances, load_instances, validate_instances};

/// One messenger deployment.
///
/// Only `key` is required; every other field overrides a value derived from
/// the key and the probe settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    /// Unique short name, also the default subdomain
    pub key: String,
    pub name: Option<String>,
    /// Messenger domain, defaults to `<key>.<messenger_domain>`
    #[serde(alias = "base_domain")]
    pub base_domain: Option<String>,
    /// Front-end host, defaults to `<key>.<frontend_domain>`
    #[serde(alias = "alternative_domain")]
    pub alternative_domain: Option<String>,
    /// SSH host, defaults to the messenger domain
    pub host: Option<String>,
    /// SSH user
    pub user: Option<String>,
    /// PEM encoded key or a path to one
    #[serde(alias = "private_key")]
    pub private_key: Option<String>,
    /// Secret used to derive the sync user's password
    #[serde(alias = "shared_secret")]
    pub shared_secret: Option<String>,
    /// Pre-provisioned admin token; skips the login when present
    #[serde(alias = "access_token")]
    pub access_token: Option<String>,
}

impl InstanceConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    /// Whether `identifier` names this instance by key or by name
    pub fn matches(&self, identifier: &str) -> bool {
        self.key == identifier || self.name.as_deref() == Some(identifier)
    }

    /// Label used in logs
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("base_domain", &self.base_domain)
            .field("alternative_domain", &self.alternative_domain)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("private_key", &redact(&self.private_key))
            .field("shared_secret", &redact(&self.shared_secret))
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

/// URLs and hosts probed for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Messenger domain, e.g. `a.messenger.schule`
    pub messenger: String,
    /// Front-end host, e.g. `a.hpi-schul-cloud.org`
    pub frontend: String,
    embed_path: String,
    sync_user: String,
}

impl Endpoints {
    pub fn resolve(instance: &InstanceConfig, settings: &ProbeSettings) -> Self {
        let messenger = instance
            .base_domain
            .clone()
            .unwrap_or_else(|| format!("{}.{}", instance.key, settings.messenger_domain));
        let frontend = instance
            .alternative_domain
            .clone()
            .unwrap_or_else(|| format!("{}.{}", instance.key, settings.frontend_domain));

        Self {
            messenger,
            frontend,
            embed_path: settings.embed_path.clone(),
            sync_user: settings.sync_user.clone(),
        }
    }

    fn homeserver(&self) -> String {
        format!("https://matrix.{}", self.messenger)
    }

    /// Fully qualified id of the sync bot, `@sync:<messenger>`
    pub fn sync_user_id(&self) -> String {
        format!("@{}:{}", self.sync_user, self.messenger)
    }

    pub fn login(&self) -> String {
        format!("{}/_matrix/client/r0/login", self.homeserver())
    }

    pub fn admin_rooms(&self) -> String {
        format!("{}/_synapse/admin/v1/rooms", self.homeserver())
    }

    pub fn admin_users(&self) -> String {
        format!("{}/_synapse/admin/v2/users", self.homeserver())
    }

    pub fn embed_script(&self) -> String {
        let path = self.embed_path.trim_start_matches('/');
        format!("https://embed.{}/{path}", self.messenger)
    }

    pub fn frontend_page(&self) -> String {
        format!("https://{}", self.frontend)
    }

    pub fn hydra_alive(&self) -> String {
        format!("https://oauth.{}/health/alive", self.frontend)
    }

    /// SSO redirect endpoint with `redirect_url` as the `redirectUrl` query
    pub fn sso_redirect(&self, redirect_url: &str) -> Result<String, ProbeError> {
        let base = format!("{}/_matrix/client/r0/login/sso/redirect", self.homeserver());
        Url::parse_with_params(&base, &[("redirectUrl", redirect_url)])
            .map(String::from)
            .map_err(|error| ProbeError::InvalidUrl(format!("{base}: {error}")))
    }

    /// Origins a correct content security policy lists for this instance
    pub fn expected_origins(&self) -> [String; 3] {
        [
            format!("https://{}", self.messenger),
            format!("https://embed.{}", self.messenger),
            format!("https://matrix.{}", self.messenger),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_default_to_key_subdomains() {
        let endpoints = Endpoints::resolve(&InstanceConfig::new("a"), &ProbeSettings::default());

        assert_eq!(endpoints.messenger, "a.messenger.schule");
        assert_eq!(endpoints.frontend, "a.hpi-schul-cloud.org");
        assert_eq!(endpoints.sync_user_id(), "@sync:a.messenger.schule");
        assert_eq!(endpoints.login(), "https://matrix.a.messenger.schule/_matrix/client/r0/login");
        assert_eq!(endpoints.embed_script(), "https://embed.a.messenger.schule/embed.js");
        assert_eq!(endpoints.hydra_alive(), "https://oauth.a.hpi-schul-cloud.org/health/alive");
    }

    #[test]
    fn test_endpoints_honour_overrides() {
        let instance = InstanceConfig {
            base_domain: Some("chat.example.org".to_string()),
            alternative_domain: Some("school.example.org".to_string()),
            ..InstanceConfig::new("a")
        };
        let endpoints = Endpoints::resolve(&instance, &ProbeSettings::default());

        assert_eq!(endpoints.admin_rooms(), "https://matrix.chat.example.org/_synapse/admin/v1/rooms");
        assert_eq!(endpoints.frontend_page(), "https://school.example.org");
        assert_eq!(endpoints.expected_origins()[1], "https://embed.chat.example.org");
    }

    #[test]
    fn test_sso_redirect_encodes_target() {
        let endpoints = Endpoints::resolve(&InstanceConfig::new("a"), &ProbeSettings::default());
        let url = endpoints.sso_redirect("https://app.element.io/#/").unwrap();

        assert_eq!(
            url,
            "https://matrix.a.messenger.schule/_matrix/client/r0/login/sso/redirect\
             ?redirectUrl=https%3A%2F%2Fapp.element.io%2F%23%2F"
        );
    }

    #[test]
    fn test_sso_redirect_rejects_malformed_domain() {
        let instance =
            InstanceConfig { base_domain: Some("bad domain".to_string()), ..InstanceConfig::new("a") };
        let endpoints = Endpoints::resolve(&instance, &ProbeSettings::default());

        let url = endpoints.sso_redirect("https://app.element.io/#/");
        assert!(matches!(url, Err(ProbeError::InvalidUrl(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let instance = InstanceConfig {
            shared_secret: Some("hunter2".to_string()),
            ..InstanceConfig::new("a")
        };

        let debug = format!("{instance:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
