//! Configuration loader for YAML files and environment overrides

use crate::config::types::*;
use crate::errors::WebcoderError;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const ENV_ASSETS_DIR: &str = "WEBCODER_ASSETS_DIR";
pub const ENV_REMOTE_BACKEND: &str = "WEBCODER_REMOTE_BACKEND";
pub const ENV_PISTON_URL: &str = "WEBCODER_PISTON_URL";
pub const ENV_JDOODLE_URL: &str = "WEBCODER_JDOODLE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "WEBCODER_REQUEST_TIMEOUT_SECS";
pub const ENV_BRIDGE_TIMEOUT_SECS: &str = "WEBCODER_BRIDGE_TIMEOUT_SECS";
pub const ENV_STORAGE_PATH: &str = "WEBCODER_STORAGE_PATH";

/// Configuration loader with environment overrides
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Result<WebcoderConfig, WebcoderError> {
        let mut config = WebcoderConfig::default();
        Self::apply_overrides(&mut config, |key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file. A missing file is not an error.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<WebcoderConfig, WebcoderError> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                return Self::from_env();
            }
            Err(e) => {
                return Err(WebcoderError::ConfigError(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut config = Self::from_str(&content)?;

        // Relative asset directories are resolved against the config file
        if config.assets_dir.is_relative() {
            if let Some(base_dir) = path.parent() {
                config.assets_dir = base_dir.join(&config.assets_dir);
            }
        }

        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<WebcoderConfig, WebcoderError> {
        let mut config: WebcoderConfig = if content.trim().is_empty() {
            WebcoderConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                WebcoderError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::apply_overrides(&mut config, |key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Applies `WEBCODER_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(config: &mut WebcoderConfig, lookup: F) -> Result<(), WebcoderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_ASSETS_DIR) {
            config.assets_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup(ENV_REMOTE_BACKEND) {
            config.remote.backend = backend.parse()?;
        }
        if let Some(url) = lookup(ENV_PISTON_URL) {
            config.remote.piston_url = url;
        }
        if let Some(url) = lookup(ENV_JDOODLE_URL) {
            config.remote.jdoodle_url = url;
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.remote.request_timeout_secs = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_BRIDGE_TIMEOUT_SECS) {
            config.bridge.response_timeout_secs = parse_secs(ENV_BRIDGE_TIMEOUT_SECS, &secs)?;
        }
        if let Some(path) = lookup(ENV_STORAGE_PATH) {
            config.storage_path = PathBuf::from(path);
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, WebcoderError> {
    value.trim().parse().map_err(|_| {
        WebcoderError::ConfigError(format!(
            "{} must be a whole number of seconds, got '{}'",
            key, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ConfigLoader::from_str(
            r#"
remote:
  backend: jdoodle
retry:
  max_attempts: 2
"#,
        )
        .unwrap();

        assert_eq!(config.remote.backend, RemoteBackend::Jdoodle);
        assert_eq!(config.remote.request_timeout_secs, 30);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.retry.max_delay_ms, 8_000);
        assert_eq!(config.bridge.response_timeout_secs, 120);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ConfigLoader::from_str("retry:\n  max_attempts: 0\n").unwrap_err();
        assert!(matches!(err, WebcoderError::ConfigError(_)));

        let err = ConfigLoader::from_str("remote:\n  piston_url: ftp://example.com\n").unwrap_err();
        assert!(err.to_string().contains("remote.piston_url"));

        let err = ConfigLoader::from_str("retry:\n  base_delay_ms: 9000\n  max_delay_ms: 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("retry.base_delay_ms"));

        assert!(ConfigLoader::from_str("remote:\n  backend: judge0\n").is_err());

        let err = ConfigLoader::from_str("retry:\n  max_attempts: 4\n").unwrap_err();
        assert!(err.to_string().contains("retry.max_attempts"));
    }

    #[test]
    fn test_bridge_timeout_must_cover_retry_budget() {
        let defaults = WebcoderConfig::default();
        assert!(defaults.validate().is_ok());
        assert!(
            defaults.bridge.response_timeout()
                >= defaults
                    .retry
                    .worst_case_duration(defaults.remote.request_timeout())
        );

        let err = ConfigLoader::from_str("bridge:\n  response_timeout_secs: 60\n").unwrap_err();
        assert!(err.to_string().contains("bridge.response_timeout_secs"));

        let err = ConfigLoader::from_str(
            "remote:\n  request_timeout_secs: 60\nretry:\n  max_retry_after_secs: 30\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("retry budget"));

        let config = ConfigLoader::from_str(
            "remote:\n  request_timeout_secs: 10\nbridge:\n  response_timeout_secs: 60\n",
        )
        .unwrap();
        assert_eq!(config.bridge.response_timeout_secs, 60);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = WebcoderConfig::default();
        ConfigLoader::apply_overrides(
            &mut config,
            lookup_from(&[
                (ENV_REMOTE_BACKEND, "JDoodle"),
                (ENV_PISTON_URL, "http://localhost:2000/api/v2/execute"),
                (ENV_BRIDGE_TIMEOUT_SECS, "5"),
                (ENV_STORAGE_PATH, "/tmp/webcoder.json"),
            ]),
        )
        .unwrap();

        assert_eq!(config.remote.backend, RemoteBackend::Jdoodle);
        assert_eq!(config.remote.piston_url, "http://localhost:2000/api/v2/execute");
        assert_eq!(config.bridge.response_timeout_secs, 5);
        assert_eq!(config.storage_path, PathBuf::from("/tmp/webcoder.json"));
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = WebcoderConfig::default();
        let err = ConfigLoader::apply_overrides(
            &mut config,
            lookup_from(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::from_file(dir.path().join("webcoder.yaml"))
            .await
            .unwrap();
        assert_eq!(config.retry, crate::http::RetryPolicy::default());
    }

    #[tokio::test]
    async fn test_relative_assets_dir_follows_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "assets_dir: bundle").unwrap();

        let config = ConfigLoader::from_file(file.path()).await.unwrap();
        let expected = file.path().parent().unwrap().join("bundle");
        assert_eq!(config.assets_dir, expected);
    }
}
