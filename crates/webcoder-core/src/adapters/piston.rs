use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::BackendAdapter;
use crate::errors::ExecutionError;
use crate::http::{build_client, network_error, send_with_retry, RetryPolicy};
use crate::language::Language;
use crate::request::CompileRequest;

pub const PISTON_EXECUTE_API_URL: &str = "https://emkc.org/api/v2/piston/execute";
const PISTON_ANY_VERSION: &str = "*";

#[derive(Debug, Serialize)]
struct PistonFile<'a> {
    name: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct PistonExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<PistonFile<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdin: Option<&'a str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PistonResult {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PistonResult {
    /// Merged output, falling back to stdout followed by stderr.
    fn text(&self) -> String {
        match self.output.as_deref() {
            Some(output) if !output.is_empty() => output.to_string(),
            _ => format!(
                "{}{}",
                self.stdout.as_deref().unwrap_or_default(),
                self.stderr.as_deref().unwrap_or_default()
            ),
        }
    }

    fn exit_code(&self) -> i64 {
        self.code.unwrap_or(0)
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PistonExecuteResponse {
    #[serde(default)]
    pub compile: Option<PistonResult>,
    #[serde(default)]
    pub run: Option<PistonResult>,
    #[serde(default)]
    pub message: Option<String>,
}

fn piston_language(language: Language) -> &'static str {
    match language {
        Language::Cpp17 | Language::Cpp20 => "c++",
        Language::Java => "java",
        Language::Python3 => "python",
        Language::Rust => "rust",
    }
}

/// Collapses the compile and run phases into the single result string.
/// A failed compile phase ends the inspection; the run phase is not looked at.
pub fn interpret_response(language: Language, response: &PistonExecuteResponse) -> String {
    let name = language.display_name();

    if let Some(compile) = &response.compile {
        let code = compile.exit_code();
        if code != 0 {
            let output = compile.text();
            let output = output.trim();
            if !output.is_empty() {
                return output.to_string();
            }
            return compile
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} compile failed (exit code: {})", name, code));
        }
    }

    let run = response.run.clone().unwrap_or_default();
    let output = run.text();
    let code = run.exit_code();
    if code != 0 {
        let trimmed = output.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
        return run
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} program exited with code {}", name, code));
    }

    output
}

/// Remote adapter for the Piston execution API.
#[derive(Debug, Clone)]
pub struct PistonAdapter {
    client: Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl PistonAdapter {
    pub fn new(timeout: Duration) -> Result<Self, ExecutionError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: PISTON_EXECUTE_API_URL.to_string(),
            retry: RetryPolicy::default(),
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
impl BackendAdapter for PistonAdapter {
    fn name(&self) -> &'static str {
        "piston"
    }

    async fn execute(&self, request: &CompileRequest) -> Result<String, ExecutionError> {
        let language = request.language;
        let backend = language.display_name();
        if request.compile_only {
            log::debug!("Piston has no compile-only mode; running {} normally", language);
        }

        let payload = PistonExecuteRequest {
            language: piston_language(language),
            version: PISTON_ANY_VERSION,
            files: vec![PistonFile {
                name: language.remote_file_name(),
                content: &request.script,
            }],
            stdin: request.stdin(),
        };

        let response = send_with_retry(&self.retry, backend, || {
            self.client.post(&self.endpoint).json(&payload)
        })
        .await
        .map_err(|e| network_error(backend, e))?;

        let status = response.status();
        if !status.is_success() {
            log::error!("{} execution API returned {}", backend, status);
            return Err(ExecutionError::Http {
                backend: backend.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<PistonExecuteResponse>()
            .await
            .map_err(|e| ExecutionError::MalformedResponse {
                backend: backend.to_string(),
                message: e.to_string(),
            })?;

        Ok(interpret_response(language, &body))
    }
}
