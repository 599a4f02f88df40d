//! Compile request types.
//!
//! `CompileRequestPayload` is the shape that crosses the messaging bridge;
//! its language is still a free-form string. `CompileRequest` is the typed,
//! validated form the dispatcher and adapters work with.

use crate::language::{Language, UnsupportedLanguage};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequestPayload {
    pub language: String,
    pub script: String,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub version_index: Option<String>,
    #[serde(default)]
    pub compile_only: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    pub language: Language,
    pub script: String,
    pub stdin: Option<String>,
    pub version_index: Option<String>,
    pub compile_only: bool,
}

impl CompileRequest {
    pub fn new(language: Language, script: impl Into<String>) -> Self {
        Self {
            language,
            script: script.into(),
            stdin: None,
            version_index: None,
            compile_only: false,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_version_index(mut self, version_index: impl Into<String>) -> Self {
        self.version_index = Some(version_index.into());
        self
    }

    pub fn with_compile_only(mut self, compile_only: bool) -> Self {
        self.compile_only = compile_only;
        self
    }

    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }
}

impl TryFrom<CompileRequestPayload> for CompileRequest {
    type Error = UnsupportedLanguage;

    fn try_from(payload: CompileRequestPayload) -> Result<Self, Self::Error> {
        let language = payload.language.parse::<Language>()?;
        Ok(Self {
            language,
            script: payload.script,
            stdin: payload.stdin,
            version_index: payload.version_index,
            compile_only: payload.compile_only.unwrap_or(false),
        })
    }
}

impl From<&CompileRequest> for CompileRequestPayload {
    fn from(request: &CompileRequest) -> Self {
        Self {
            language: request.language.as_str().to_string(),
            script: request.script.clone(),
            stdin: request.stdin.clone(),
            version_index: request.version_index.clone(),
            compile_only: Some(request.compile_only),
        }
    }
}
