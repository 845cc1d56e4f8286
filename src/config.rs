use crate::error::FetchError;
use crate::settings::ConnectionSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutputType {
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTarget {
    #[serde(rename = "type")]
    pub output_type: LogOutputType,
    pub path: Option<PathBuf>,
    pub level: Option<LogLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<LogLevel>,
    pub format: Option<LogFormat>,
    pub targets: Option<Vec<LogTarget>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Some(LogLevel::Info),
            format: Some(LogFormat::Text),
            targets: Some(vec![LogTarget {
                output_type: LogOutputType::Stdout,
                path: None,
                level: None,
            }]),
        }
    }
}

/// A named instance and the settings its client is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub id: String,
    #[serde(flatten)]
    pub settings: ConnectionSettings,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_proxy_path() -> String {
    "/proxy".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Path the proxy endpoint is served on.
    #[serde(default = "default_proxy_path")]
    pub proxy_path: String,
    // Fallback deadline for instances without timeout_secs
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            proxy_path: default_proxy_path(),
            request_timeout_secs: None,
            private_key: None,
            certificate: None,
            logging: None,
            instances: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if !self.proxy_path.starts_with('/') {
            return Err(FetchError::Configuration(format!(
                "proxy_path must start with '/': {}",
                self.proxy_path
            )));
        }

        match (&self.private_key, &self.certificate) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(FetchError::Configuration(
                    "private_key and certificate must be configured together".to_string(),
                ));
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if instance.id.trim().is_empty() {
                return Err(FetchError::Configuration("instance id cannot be empty".to_string()));
            }
            if !seen.insert(instance.id.as_str()) {
                return Err(FetchError::Configuration(format!(
                    "duplicate instance id: {}",
                    instance.id
                )));
            }
        }

        if self.instances.is_empty() {
            log::warn!("No instances configured; every proxy call will fail to resolve");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_instances_with_flattened_settings() {
        let config: Config = serde_json::from_str(
            r#"{
                "listen_addr": "0.0.0.0:9000",
                "request_timeout_secs": 30,
                "instances": [{
                    "id": "github",
                    "url": "https://api.github.com",
                    "basic_auth_enabled": true,
                    "user_name": "bot",
                    "password": "pw",
                    "custom_headers": {"Accept": "application/vnd.github+json"},
                    "secure_query_fields": {"token": "abc"}
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.proxy_path, "/proxy");
        assert_eq!(config.request_timeout_secs, Some(30));
        let instance = &config.instances[0];
        assert_eq!(instance.id, "github");
        assert_eq!(instance.settings.url, "https://api.github.com");
        assert!(instance.settings.basic_auth_enabled);
        assert_eq!(instance.settings.secure_query_fields["token"], "abc");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_instance_ids() {
        let mut config = Config::default();
        for _ in 0..2 {
            config.instances.push(InstanceConfig {
                id: "same".to_string(),
                settings: ConnectionSettings::new("https://example.com"),
            });
        }
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "duplicate instance id: same");
    }

    #[test]
    fn rejects_half_configured_tls() {
        let mut config = Config::default();
        config.private_key = Some("key.pem".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_relative_proxy_path() {
        let mut config = Config::default();
        config.proxy_path = "proxy".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.instances.push(InstanceConfig {
            id: "local".to_string(),
            settings: ConnectionSettings::new("http://localhost:3000").with_timeout_secs(10),
        });
        config.to_file(path).unwrap();

        let loaded = Config::from_file(path).unwrap();
        assert_eq!(loaded.instances.len(), 1);
        assert_eq!(loaded.instances[0].settings.timeout_secs, Some(10));
    }
}
