//! Loading, validating and narrowing the set of probed instances.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::InstanceConfig;
use crate::error::ConfigError;

/// TOML instance files wrap the list in an `instances` array of tables
#[derive(Deserialize)]
struct InstanceFile {
    #[serde(default)]
    instances: Vec<InstanceConfig>,
}

/// Load instances from a JSON array file or a TOML file with `[[instances]]`.
pub fn load_instances(path: &Path) -> Result<Vec<InstanceConfig>, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

    let parse_error =
        |message: String| ConfigError::Parse { path: path.to_path_buf(), message };

    let instances = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str::<Vec<InstanceConfig>>(&raw)
            .map_err(|error| parse_error(error.to_string()))?,
        _ => {
            toml::from_str::<InstanceFile>(&raw)
                .map_err(|error| parse_error(error.to_string()))?
                .instances
        }
    };

    debug!("Loaded {} instances from {}", instances.len(), path.display());
    Ok(instances)
}

/// Reject empty or duplicate keys.
pub fn validate_instances(instances: &[InstanceConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for instance in instances {
        if instance.key.trim().is_empty() {
            return Err(ConfigError::Invalid("instance key cannot be empty".to_string()));
        }
        if !seen.insert(instance.key.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate instance key '{}'", instance.key)));
        }
    }

    Ok(())
}

/// Keep the instances named by any of `identifiers`, by key or name.
///
/// No identifiers means no filtering. Order is preserved.
pub fn filter_instances<S: AsRef<str>>(
    instances: &[InstanceConfig],
    identifiers: &[S],
) -> Vec<InstanceConfig> {
    if identifiers.is_empty() {
        return instances.to_vec();
    }

    instances
        .iter()
        .filter(|instance| identifiers.iter().any(|id| instance.matches(id.as_ref())))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn named(key: &str, name: &str) -> InstanceConfig {
        InstanceConfig { name: Some(name.to_string()), ..InstanceConfig::new(key) }
    }

    #[test]
    fn test_filter_without_identifiers_keeps_everything() {
        let instances = vec![InstanceConfig::new("a"), InstanceConfig::new("b")];
        let filtered = filter_instances::<&str>(&instances, &[]);
        assert_eq!(filtered, instances);
    }

    #[test]
    fn test_filter_by_key() {
        let instances =
            vec![InstanceConfig::new("a"), InstanceConfig::new("b"), InstanceConfig::new("c")];
        let filtered = filter_instances(&instances, &["b"]);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].key, "b");
    }

    #[test]
    fn test_filter_by_name_preserves_order() {
        let instances = vec![named("a", "Alpha"), named("b", "Beta"), named("c", "Gamma")];
        let filtered = filter_instances(&instances, &["Gamma", "a"]);

        let keys: Vec<_> = filtered.iter().map(|instance| instance.key.as_str()).collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn test_filter_unknown_identifier_is_empty() {
        let instances = vec![InstanceConfig::new("a")];
        assert!(filter_instances(&instances, &["zzz"]).is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_blank_keys() {
        assert!(validate_instances(&[InstanceConfig::new("a"), InstanceConfig::new("b")]).is_ok());
        assert!(validate_instances(&[InstanceConfig::new("a"), InstanceConfig::new("a")]).is_err());
        assert!(validate_instances(&[InstanceConfig::new(" ")]).is_err());
    }

    #[test]
    fn test_load_json_instances() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"key": "a", "name": "Alpha", "baseDomain": "chat.a.org", "sharedSecret": "s"}},
                {{"key": "b", "privateKey": "/keys/b"}}]"#
        )
        .unwrap();

        let instances = load_instances(file.path()).unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].base_domain.as_deref(), Some("chat.a.org"));
        assert_eq!(instances[0].shared_secret.as_deref(), Some("s"));
        assert_eq!(instances[1].private_key.as_deref(), Some("/keys/b"));
    }

    #[test]
    fn test_load_toml_instances_accepts_snake_case() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[[instances]]\nkey = \"a\"\nalternative_domain = \"school.a.org\"\n").unwrap();

        let instances = load_instances(file.path()).unwrap();
        assert_eq!(instances[0].alternative_domain.as_deref(), Some("school.a.org"));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "[{{\"name\": \"no key\"}}]").unwrap();

        assert!(matches!(load_instances(file.path()), Err(ConfigError::Parse { .. })));
    }
}
