//! JDoodle API credentials kept in local storage.

use crate::errors::WebcoderError;
use crate::storage::LocalStorage;
use serde::{Deserialize, Serialize};

pub const JDOODLE_API_URL: &str = "https://api.jdoodle.com/v1/execute";
pub const JDOODLE_CREDENTIALS_STORAGE_KEY: &str = "jdoodle.credentials";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdoodleCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl JdoodleCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Trimmed copy, or `None` when either half is blank.
    pub fn normalized(&self) -> Option<JdoodleCredentials> {
        let client_id = self.client_id.trim();
        let client_secret = self.client_secret.trim();
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }
        Some(JdoodleCredentials::new(client_id, client_secret))
    }
}

/// Loads usable credentials. A missing, malformed or blank entry is `None`.
pub async fn load_credentials(storage: &LocalStorage) -> Option<JdoodleCredentials> {
    match storage
        .get::<JdoodleCredentials>(JDOODLE_CREDENTIALS_STORAGE_KEY)
        .await
    {
        Ok(stored) => stored.and_then(|c| c.normalized()),
        Err(e) => {
            log::warn!("Ignoring unreadable JDoodle credentials: {}", e);
            None
        }
    }
}

pub async fn save_credentials(
    storage: &LocalStorage,
    credentials: &JdoodleCredentials,
) -> Result<(), WebcoderError> {
    let normalized = credentials.normalized().ok_or_else(|| {
        WebcoderError::ValidationError("client ID and client secret must not be empty".to_string())
    })?;
    storage
        .set(JDOODLE_CREDENTIALS_STORAGE_KEY, &normalized)
        .await
}

pub async fn clear_credentials(storage: &LocalStorage) -> Result<(), WebcoderError> {
    storage.remove(JDOODLE_CREDENTIALS_STORAGE_KEY).await
}
