use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::Deserialize;
use url::Url;
use tracing::debug;

use crate::checks::CheckKind;
use crate::error::ConfigError;
use crate::instance::{InstanceConfig, load_instances, validate_instances};
use crate::report::ReportFormat;

/// Request deadline of the reference deployment
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 100 * 20;
/// Delay between the end of one round and the start of the next
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
    /// Extra instance list, relative to the config file
    #[serde(default)]
    pub instances_file: Option<path::PathBuf>,
}

/// Tunables shared by every check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub request_timeout_secs: u64,
    pub interval_secs: u64,
    /// Outer bound for one check invocation, on top of the request deadline
    pub check_timeout_secs: Option<u64>,
    pub messenger_domain: String,
    pub frontend_domain: String,
    /// Denominator of the `corsHeaders` metric
    pub expected_cors_origins: u32,
    pub sync_user: String,
    pub sso_redirect_url: String,
    pub embed_path: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub checks: Vec<CheckKind>,
    pub format: ReportFormat,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            check_timeout_secs: None,
            messenger_domain: "messenger.schule".into(),
            frontend_domain: "hpi-schul-cloud.org".into(),
            expected_cors_origins: 8,
            sync_user: "sync".into(),
            sso_redirect_url: "https://app.element.io/#/".into(),
            embed_path: "/embed.js".into(),
            ssh_port: 22,
            ssh_user: "root".into(),
            checks: CheckKind::ALL.to_vec(),
            format: ReportFormat::Table,
        }
    }
}

impl ProbeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be positive".into()));
        }
        if self.check_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("check_timeout_secs must be positive".into()));
        }
        if self.expected_cors_origins == 0 {
            return Err(ConfigError::Invalid("expected_cors_origins must be positive".into()));
        }
        if let Err(error) = Url::parse(&self.sso_redirect_url) {
            return Err(ConfigError::Invalid(format!("sso_redirect_url is not a url: {error}")));
        }
        Ok(())
    }
}

/// Get default config path ($XDG_CONFIG_HOME/fedprobe/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("fedprobe/config.toml"))
}

impl fmt::Display for ProbeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_1 = |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
            writeln!(f, "  {label}: {value}")
        };
        let checks =
            self.checks.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");

        writeln!(f, "Probe settings:")?;
        write_1(f, "Request timeout", &format!("{}s", self.request_timeout_secs))?;
        write_1(f, "Interval", &format!("{}s", self.interval_secs))?;
        match self.check_timeout_secs {
            Some(secs) => write_1(f, "Check timeout", &format!("{secs}s"))?,
            None => write_1(f, "Check timeout", &"none")?,
        }
        write_1(f, "Messenger domain", &self.messenger_domain)?;
        write_1(f, "Frontend domain", &self.frontend_domain)?;
        write_1(f, "Expected CORS origins", &self.expected_cors_origins)?;
        write_1(f, "Checks", &checks)?;
        write_1(f, "Format", &self.format)?;

        Ok(())
    }
}

impl Config {
    /// Load the configuration from `optional_path` or the default location.
    ///
    /// Unlike the settings, a missing file is an error: there is nothing to
    /// probe without instances.
    ///
    /// ```no_run
    /// let cfg = fedprobe::config::Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg.probe);
    /// # Ok::<(), fedprobe::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = match optional_path {
            Some(path) => path.as_ref().to_path_buf(),
            None => default_config_path()?,
        };

        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
        let mut config = Self::from_toml_str(&raw_string)
            .map_err(|message| ConfigError::Parse { path: config_path.clone(), message })?;

        if let Some(file) = config.instances_file.take() {
            let file = match config_path.parent() {
                Some(parent) if file.is_relative() => parent.join(file),
                _ => file,
            };
            config.instances.extend(load_instances(&file)?);
        }

        config.validate()?;
        debug!("Loaded {} instances from {}", config.instances.len(), config_path.display());
        Ok(config)
    }

    fn from_toml_str(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|error| error.to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.probe.validate()?;
        validate_instances(&self.instances)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_file(dir: &path::Path, name: &str, contents: &str) -> path::PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_match_reference_deployment() {
        let settings = ProbeSettings::default();
        assert_eq!(settings.request_timeout(), Duration::from_secs(2000));
        assert_eq!(settings.interval(), Duration::from_secs(60));
        assert_eq!(settings.expected_cors_origins, 8);
        assert_eq!(settings.checks, CheckKind::ALL.to_vec());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_probe_table_keeps_defaults() {
        let config = Config::from_toml_str(
            "[probe]\ninterval_secs = 30\nchecks = [\"embed\", \"cors\"]\nformat = \"json\"\n",
        )
        .unwrap();

        assert_eq!(config.probe.interval_secs, 30);
        assert_eq!(config.probe.checks, vec![CheckKind::Embed, CheckKind::Cors]);
        assert_eq!(config.probe.format, ReportFormat::Json);
        assert_eq!(config.probe.ssh_port, 22);
        assert!(config.instances.is_empty());
    }

    #[test]
    fn test_from_config_merges_instances_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "instances.json", r#"[{"key": "b"}, {"key": "c"}]"#);
        let config_path = write_file(
            dir.path(),
            "config.toml",
            "instances_file = \"instances.json\"\n\n[[instances]]\nkey = \"a\"\n",
        );

        let config = Config::from_config(Some(&config_path)).unwrap();
        let keys: Vec<_> = config.instances.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn test_from_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_config(Some(dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_from_config_rejects_duplicate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_file(
            dir.path(),
            "config.toml",
            "[[instances]]\nkey = \"a\"\n\n[[instances]]\nkey = \"a\"\n",
        );

        assert!(matches!(Config::from_config(Some(&config_path)), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_config_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_file(dir.path(), "config.toml", "[probe]\ninterval_secs = 0\n");

        assert!(matches!(Config::from_config(Some(&config_path)), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_config_rejects_relative_sso_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let config_path =
            write_file(dir.path(), "config.toml", "[probe]\nsso_redirect_url = \"/#/home\"\n");

        assert!(matches!(Config::from_config(Some(&config_path)), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_file(dir.path(), "config.toml", "[probe\n");

        assert!(matches!(Config::from_config(Some(&config_path)), Err(ConfigError::Parse { .. })));
    }
}
