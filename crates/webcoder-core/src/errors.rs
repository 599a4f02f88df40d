//! Error types for the execution core
//!
//! Two layers of failure are kept apart. `ExecutionError` is what a backend
//! adapter (or the WASI runtime underneath it) raises while trying to run a
//! program; the dispatcher never lets it escape and instead folds it into a
//! fixed user-facing message. `WebcoderError` covers everything around the
//! execution path, such as configuration and the key-value storage.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum WebcoderError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for WebcoderError {
    fn from(err: std::io::Error) -> Self {
        WebcoderError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for WebcoderError {
    fn from(err: serde_json::Error) -> Self {
        WebcoderError::StorageError(err.to_string())
    }
}

// Failures raised by an execution backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("{backend} execution API error ({status})")]
    Http { backend: String, status: u16 },
    #[error("Network error while contacting {backend}: {message}")]
    Network { backend: String, message: String },
    #[error("Malformed response from {backend}: {message}")]
    MalformedResponse { backend: String, message: String },
    #[error("Remote execution credentials are missing or incomplete")]
    MissingCredentials,
    #[error("Failed to load asset '{path}': {message}")]
    AssetFetch { path: String, message: String },
    #[error("Failed to unpack asset '{path}': {message}")]
    AssetDecode { path: String, message: String },
    #[error("Executable not found in virtual filesystem: {0}")]
    MissingBinary(String),
    #[error("WASI runtime error: {0}")]
    Runtime(String),
}

impl ExecutionError {
    /// HTTP status carried by the error, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExecutionError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::Runtime(err.to_string())
    }
}
