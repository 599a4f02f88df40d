//! Compile dispatcher.
//!
//! Picks the adapter for a request's language and folds every possible
//! outcome into the single string the caller shows:
//!
//! 1. local success: normalized output
//! 2. local failure: the fixed local-failure message, never retried remotely
//! 3. remote success: normalized output
//! 4. remote failure: the taxonomy message for the carried HTTP status, or
//!    the fixed missing-configuration message
//!
//! Languages outside the supported set never reach an adapter.

use std::convert::TryFrom;
use std::sync::Arc;

use crate::adapters::{BackendAdapter, JdoodleAdapter, PistonAdapter, WasmAdapter};
use crate::assets::{AssetCache, DirAssetSource};
use crate::classify::{classify_http_status, ErrorKind};
use crate::config::{RemoteBackend, WebcoderConfig};
use crate::errors::{ExecutionError, WebcoderError};
use crate::language::{BackendFamily, Language};
use crate::normalize::normalize_output;
use crate::request::{CompileRequest, CompileRequestPayload};
use crate::runtime::WasiRuntime;
use crate::storage::LocalStorage;

pub struct CompileDispatcher {
    local: Option<Arc<dyn BackendAdapter>>,
    remote: Arc<dyn BackendAdapter>,
}

/// Message for a remote adapter failure.
pub fn remote_failure_message(error: &ExecutionError) -> &'static str {
    match error {
        ExecutionError::MissingCredentials => ErrorKind::MissingConfiguration.message(),
        ExecutionError::Http { status, .. } => classify_http_status(*status).message(),
        ExecutionError::Network { .. } => ErrorKind::NetworkFailure.message(),
        _ => ErrorKind::ServerError.message(),
    }
}

impl CompileDispatcher {
    /// `local` is `None` when no WASI runtime could be set up; local
    /// languages then answer with the local-failure message.
    pub fn new(local: Option<Arc<dyn BackendAdapter>>, remote: Arc<dyn BackendAdapter>) -> Self {
        Self { local, remote }
    }

    pub fn from_config(config: &WebcoderConfig) -> Result<Self, WebcoderError> {
        let timeout = config.remote.request_timeout();
        let setup_error = |e: ExecutionError| WebcoderError::ConfigError(e.to_string());

        let remote: Arc<dyn BackendAdapter> = match config.remote.backend {
            RemoteBackend::Piston => Arc::new(
                PistonAdapter::new(timeout)
                    .map_err(setup_error)?
                    .with_endpoint(config.remote.piston_url.as_str())
                    .with_retry_policy(config.retry.clone()),
            ),
            RemoteBackend::Jdoodle => {
                let storage = Arc::new(LocalStorage::new(&config.storage_path));
                Arc::new(
                    JdoodleAdapter::new(storage, timeout)
                        .map_err(setup_error)?
                        .with_endpoint(config.remote.jdoodle_url.as_str())
                        .with_retry_policy(config.retry.clone()),
                )
            }
        };

        let local = local_runtime().map(|runtime| {
            let source = Arc::new(DirAssetSource::new(&config.assets_dir));
            let assets = Arc::new(AssetCache::new(source));
            Arc::new(WasmAdapter::new(runtime, assets)) as Arc<dyn BackendAdapter>
        });

        log::info!(
            "Dispatcher ready (local: {}, remote: {})",
            local.as_ref().map(|a| a.name()).unwrap_or("unavailable"),
            remote.name()
        );

        Ok(Self::new(local, remote))
    }

    /// Entry point for bridge payloads, whose language is still untyped.
    pub async fn compile_payload(&self, payload: CompileRequestPayload) -> String {
        match CompileRequest::try_from(payload) {
            Ok(request) => self.compile(&request).await,
            Err(unsupported) => {
                log::warn!("Rejected compile request: {}", unsupported);
                unsupported.to_string()
            }
        }
    }

    pub async fn compile(&self, request: &CompileRequest) -> String {
        let language = request.language;
        match language.backend_family() {
            BackendFamily::Local => self.compile_local(language, request).await,
            BackendFamily::Remote => self.compile_remote(language, request).await,
        }
    }

    async fn compile_local(&self, language: Language, request: &CompileRequest) -> String {
        let Some(adapter) = &self.local else {
            log::error!("No local runtime available for {}", language);
            return ErrorKind::LocalExecutionFailed.message().to_string();
        };

        match adapter.execute(request).await {
            Ok(raw) => normalize_output(language, &raw),
            Err(e) => {
                log::error!("{} local execution failed: {}", language, e);
                ErrorKind::LocalExecutionFailed.message().to_string()
            }
        }
    }

    async fn compile_remote(&self, language: Language, request: &CompileRequest) -> String {
        match self.remote.execute(request).await {
            Ok(raw) => normalize_output(language, &raw),
            Err(e) => {
                log::error!(
                    "{} remote execution via {} failed: {}",
                    language,
                    self.remote.name(),
                    e
                );
                remote_failure_message(&e).to_string()
            }
        }
    }
}

#[cfg(feature = "wasmtime")]
fn local_runtime() -> Option<Arc<dyn WasiRuntime>> {
    match crate::runtime::WasmtimeRuntime::new() {
        Ok(runtime) => Some(Arc::new(runtime)),
        Err(e) => {
            log::error!("Failed to initialize wasmtime: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "wasmtime"))]
fn local_runtime() -> Option<Arc<dyn WasiRuntime>> {
    log::warn!("Built without the wasmtime feature; C++ and Python will not run locally");
    None
}
