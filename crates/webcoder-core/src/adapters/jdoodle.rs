use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::BackendAdapter;
use crate::credentials::{load_credentials, JDOODLE_API_URL};
use crate::errors::ExecutionError;
use crate::http::{build_client, network_error, send_with_retry, RetryPolicy};
use crate::request::CompileRequest;
use crate::storage::LocalStorage;

const DEFAULT_VERSION_INDEX: &str = "0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JdoodleExecuteRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    script: &'a str,
    language: &'a str,
    version_index: &'a str,
    stdin: &'a str,
    compile_only: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdoodleExecuteResponse {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Remote adapter for the JDoodle execute API. Credentials are read from
/// local storage on every call so a change made through the CLI takes effect
/// without a restart.
#[derive(Debug, Clone)]
pub struct JdoodleAdapter {
    client: Client,
    endpoint: String,
    retry: RetryPolicy,
    storage: Arc<LocalStorage>,
}

impl JdoodleAdapter {
    pub fn new(storage: Arc<LocalStorage>, timeout: Duration) -> Result<Self, ExecutionError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: JDOODLE_API_URL.to_string(),
            retry: RetryPolicy::default(),
            storage,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl BackendAdapter for JdoodleAdapter {
    fn name(&self) -> &'static str {
        "jdoodle"
    }

    async fn execute(&self, request: &CompileRequest) -> Result<String, ExecutionError> {
        let credentials = load_credentials(&self.storage)
            .await
            .ok_or(ExecutionError::MissingCredentials)?;

        let language = request.language;
        let backend = language.display_name();
        let payload = JdoodleExecuteRequest {
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            script: &request.script,
            language: language.as_str(),
            version_index: request
                .version_index
                .as_deref()
                .unwrap_or(DEFAULT_VERSION_INDEX),
            stdin: request.stdin().unwrap_or_default(),
            compile_only: request.compile_only,
        };

        let response = send_with_retry(&self.retry, backend, || {
            self.client.post(&self.endpoint).json(&payload)
        })
        .await
        .map_err(|e| network_error(backend, e))?;

        let status = response.status();
        if !status.is_success() {
            log::error!("{} execution API (JDoodle) returned {}", backend, status);
            return Err(ExecutionError::Http {
                backend: backend.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<JdoodleExecuteResponse>()
            .await
            .map_err(|e| ExecutionError::MalformedResponse {
                backend: backend.to_string(),
                message: e.to_string(),
            })?;

        // JDoodle sometimes reports failures inside a 200 body
        if let Some(error) = body.error.as_deref() {
            let status = body.status_code.filter(|code| *code >= 400).unwrap_or(500);
            log::error!("{} execution API (JDoodle) reported: {}", backend, error);
            return Err(ExecutionError::Http {
                backend: backend.to_string(),
                status,
            });
        }

        Ok(body.output.unwrap_or_default())
    }
}
