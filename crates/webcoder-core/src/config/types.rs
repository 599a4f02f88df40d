use crate::errors::WebcoderError;
use crate::http::{RetryPolicy, MAX_ATTEMPTS};
use crate::storage::LocalStorage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::piston::PISTON_EXECUTE_API_URL;
use crate::credentials::JDOODLE_API_URL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebcoderConfig {
    /// Directory holding the `wasm/` asset bundle.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default = "LocalStorage::default_path")]
    pub storage_path: PathBuf,
}

impl Default for WebcoderConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            remote: RemoteConfig::default(),
            retry: RetryPolicy::default(),
            bridge: BridgeConfig::default(),
            storage_path: LocalStorage::default_path(),
        }
    }
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

/// Remote execution service used for Java and Rust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    #[default]
    Piston,
    Jdoodle,
}

impl std::str::FromStr for RemoteBackend {
    type Err = WebcoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "piston" => Ok(RemoteBackend::Piston),
            "jdoodle" => Ok(RemoteBackend::Jdoodle),
            other => Err(WebcoderError::ConfigError(format!(
                "Unknown remote backend '{}' (expected 'piston' or 'jdoodle')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: RemoteBackend,
    #[serde(default = "default_piston_url")]
    pub piston_url: String,
    #[serde(default = "default_jdoodle_url")]
    pub jdoodle_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: RemoteBackend::default(),
            piston_url: default_piston_url(),
            jdoodle_url: default_jdoodle_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_piston_url() -> String {
    PISTON_EXECUTE_API_URL.to_string()
}

fn default_jdoodle_url() -> String {
    JDOODLE_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// How long a caller waits for a reply before substituting the fallback.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: default_response_timeout_secs(),
        }
    }
}

impl BridgeConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

fn default_response_timeout_secs() -> u64 {
    120
}

fn validate_url(field: &str, url: &str) -> Result<(), WebcoderError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(WebcoderError::ConfigError(format!(
            "{} must be an http(s) URL, got '{}'",
            field, url
        )))
    }
}

impl WebcoderConfig {
    pub fn validate(&self) -> Result<(), WebcoderError> {
        if self.assets_dir.as_os_str().is_empty() {
            return Err(WebcoderError::ConfigError("assets_dir cannot be empty".to_string()));
        }

        if self.storage_path.as_os_str().is_empty() {
            return Err(WebcoderError::ConfigError("storage_path cannot be empty".to_string()));
        }

        validate_url("remote.piston_url", &self.remote.piston_url)?;
        validate_url("remote.jdoodle_url", &self.remote.jdoodle_url)?;

        if self.remote.request_timeout_secs == 0 {
            return Err(WebcoderError::ConfigError(
                "remote.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_ATTEMPTS {
            return Err(WebcoderError::ConfigError(format!(
                "retry.max_attempts must be between 1 and {}, got {}",
                MAX_ATTEMPTS, self.retry.max_attempts
            )));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(WebcoderError::ConfigError(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }

        if self.bridge.response_timeout_secs == 0 {
            return Err(WebcoderError::ConfigError(
                "bridge.response_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // A reply that outlives the bridge timeout is replaced by the fallback
        let budget = self.retry.worst_case_duration(self.remote.request_timeout());
        if self.bridge.response_timeout() < budget {
            return Err(WebcoderError::ConfigError(format!(
                "bridge.response_timeout_secs ({}) is shorter than the remote retry budget ({:?})",
                self.bridge.response_timeout_secs, budget
            )));
        }

        Ok(())
    }
}
