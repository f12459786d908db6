//! Service configuration

use crate::retry::RetryPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Configuration for [`IpamService`](crate::service::IpamService)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpamConfig {
    /// Store path of the pool catalog (YAML)
    pub pools_file: String,
    /// Store path of the allocation ledger (JSON)
    pub allocations_file: String,
    /// Conflict retry policy for mutations
    pub retry: RetryPolicy,
}

impl Default for IpamConfig {
    fn default() -> Self {
        Self {
            pools_file: "pools.yaml".to_string(),
            allocations_file: "allocations.json".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl IpamConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        let defaults = Self::default();

        Self {
            pools_file: lookup("IPAM_POOLS_FILE").unwrap_or(defaults.pools_file),
            allocations_file: lookup("IPAM_ALLOCATIONS_FILE").unwrap_or(defaults.allocations_file),
            retry: RetryPolicy {
                max_retries: parsed(&lookup, "IPAM_MAX_RETRIES").unwrap_or(defaults.retry.max_retries),
                base_delay_ms: parsed(&lookup, "IPAM_BASE_DELAY_MS").unwrap_or(defaults.retry.base_delay_ms),
                max_delay_ms: parsed(&lookup, "IPAM_MAX_DELAY_MS").unwrap_or(defaults.retry.max_delay_ms),
                jitter: parsed(&lookup, "IPAM_JITTER").unwrap_or(defaults.retry.jitter),
            },
        }
    }

    /// Load from a `.yaml`, `.yml` or `.json` file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(Error::Config(format!(
                    "Unsupported config format: {}",
                    other.unwrap_or("<none>")
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pools_file.trim().is_empty() || self.allocations_file.trim().is_empty() {
            return Err(Error::Config("document paths must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(Error::Config(format!(
                "jitter must be between 0 and 1, got {}",
                self.retry.jitter
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(format!(
                "base delay {}ms exceeds max delay {}ms",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = IpamConfig::default();
        assert_eq!(config.pools_file, "pools.yaml");
        assert_eq!(config.allocations_file, "allocations.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_lookup() {
        let env: HashMap<&str, &str> = [
            ("IPAM_POOLS_FILE", "ipam/pools.yaml"),
            ("IPAM_MAX_RETRIES", "3"),
            ("IPAM_JITTER", "0.1"),
            ("IPAM_BASE_DELAY_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = IpamConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.pools_file, "ipam/pools.yaml");
        assert_eq!(config.allocations_file, "allocations.json");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.jitter, 0.1);
        assert_eq!(config.retry.base_delay_ms, 200);
    }

    #[test]
    fn test_load_yaml() {
        let file = write_config(
            ".yaml",
            "pools_file: net/pools.yaml\nretry:\n  max_retries: 2\n  base_delay_ms: 50\n",
        );
        let config = IpamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.pools_file, "net/pools.yaml");
        assert_eq!(config.allocations_file, "allocations.json");
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay_ms, 50);
        assert_eq!(config.retry.max_delay_ms, 5_000);
    }

    #[test]
    fn test_load_json() {
        let file = write_config(".json", r#"{"allocations_file": "ledger.json"}"#);
        let config = IpamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.allocations_file, "ledger.json");
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let file = write_config(".toml", "x = 1");
        assert!(matches!(
            IpamConfig::load_from_file(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let file = write_config(".yml", "retry:\n  jitter: 1.5\n");
        assert!(matches!(
            IpamConfig::load_from_file(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_delays() {
        let mut config = IpamConfig::default();
        config.retry.base_delay_ms = 10_000;
        assert!(config.validate().is_err());
    }
}
