//!
//! Client configuration.
//!
//! Settings come from an optional JSON file and are then overridden by
//! `URLACL_*` environment variables:
//!
//! | Variable                  | Field                | Format            |
//! |---------------------------|----------------------|-------------------|
//! | `URLACL_API_VERSION`      | `api_version`        | `major.minor`     |
//! | `URLACL_MAX_BUFFER_LEN`   | `max_buffer_len`     | bytes             |
//! | `URLACL_RESOLVE_ACCOUNTS` | `resolve_accounts`   | `true/false/1/0`  |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("invalid configuration JSON: {0}")]
    Parse(String),
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// HTTP Server API version passed to `HttpInitialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl ApiVersion {
    pub const V1: ApiVersion = ApiVersion { major: 1, minor: 0 };
    pub const V2: ApiVersion = ApiVersion { major: 2, minor: 0 };
}

impl Default for ApiVersion {
    fn default() -> Self {
        ApiVersion::V1
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.trim().split_once('.').unwrap_or((s.trim(), "0"));
        let major = major.parse().map_err(|_| format!("'{}' is not a version", s))?;
        let minor = minor.parse().map_err(|_| format!("'{}' is not a version", s))?;
        Ok(ApiVersion { major, minor })
    }
}

/// Settings for [`crate::UrlAclClient`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub api_version: ApiVersion,
    /// Output buffer handed to the first query. Zero makes the store report the size it needs.
    pub initial_buffer_len: usize,
    /// Largest buffer the enumeration will grow to.
    pub max_buffer_len: usize,
    /// Translate SIDs to account names when enumerating.
    pub resolve_accounts: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_version: ApiVersion::V1,
            initial_buffer_len: 0,
            max_buffer_len: 1024 * 1024,
            resolve_accounts: true,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<ClientConfig, ConfigError> {
        let config: ClientConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loaded client configuration");
        ClientConfig::from_json_str(&text)
    }

    /// Applies `URLACL_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<ClientConfig, ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Applies overrides from any variable source.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<ClientConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("URLACL_API_VERSION") {
            self.api_version = value
                .parse()
                .map_err(|reason| ConfigError::InvalidValue { field: "api_version", reason })?;
        }
        if let Some(value) = lookup("URLACL_MAX_BUFFER_LEN") {
            self.max_buffer_len = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "max_buffer_len",
                reason: format!("'{}' is not a byte count", value),
            })?;
        }
        if let Some(value) = lookup("URLACL_RESOLVE_ACCOUNTS") {
            self.resolve_accounts = parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                field: "resolve_accounts",
                reason: format!("'{}' is not a boolean", value),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version.major == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api_version",
                reason: "major version must be at least 1".to_string(),
            });
        }
        if self.max_buffer_len < self.initial_buffer_len {
            return Err(ConfigError::InvalidValue {
                field: "max_buffer_len",
                reason: format!(
                    "{} is smaller than initial_buffer_len {}",
                    self.max_buffer_len, self.initial_buffer_len
                ),
            });
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_version.to_string(), "1.0");
    }

    #[test]
    fn test_partial_json() {
        let config = ClientConfig::from_json_str(
            r#"{ "api_version": { "major": 2, "minor": 0 }, "resolve_accounts": false }"#,
        )
        .unwrap();
        assert_eq!(config.api_version, ApiVersion::V2);
        assert!(!config.resolve_accounts);
        assert_eq!(config.max_buffer_len, 1024 * 1024);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            ClientConfig::from_json_str(r#"{ "buffer": 1 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("URLACL_API_VERSION", "2.0"),
            ("URLACL_MAX_BUFFER_LEN", "4096"),
            ("URLACL_RESOLVE_ACCOUNTS", "0"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::default()
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_version, ApiVersion::V2);
        assert_eq!(config.max_buffer_len, 4096);
        assert!(!config.resolve_accounts);
    }

    #[test]
    fn test_invalid_env_values() {
        let err = ClientConfig::default()
            .apply_vars(|name| (name == "URLACL_RESOLVE_ACCOUNTS").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "resolve_accounts", .. }));

        let err = ClientConfig::default()
            .apply_vars(|name| (name == "URLACL_API_VERSION").then(|| "0.5".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "api_version", .. }));
    }

    #[test]
    fn test_buffer_limits_validated() {
        let config = ClientConfig { initial_buffer_len: 10, max_buffer_len: 5, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_missing_path() {
        let err = ClientConfig::from_path(Path::new("/nonexistent/urlacl.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
