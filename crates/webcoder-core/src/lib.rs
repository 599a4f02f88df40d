//! Compile and execution core for running judge solutions against test cases.
//!
//! A caller hands over a source program, its language and one test input, and
//! gets back a single string: the program's output or a short human-readable
//! explanation of what went wrong. Everything between those two points lives
//! here.
//!
//! # Architecture Overview
//!
//! - **Backend adapters**: an in-process WASI virtual machine for C++ and
//!   Python, and remote execution APIs (Piston, JDoodle) for Java and Rust
//! - **Output normalizer**: strips backend noise and maps resource-limit
//!   sentinels to canonical phrases
//! - **Error classifier**: tells compile errors apart from infrastructure
//!   failures and maps HTTP statuses to fixed messages
//! - **Compile dispatcher**: routes a request to exactly one adapter and folds
//!   every outcome into one string
//! - **Messaging bridge**: one-shot request/response relay to the background
//!   service that owns the dispatcher
//! - **Configuration and storage**: YAML configuration with environment
//!   overrides, and a small JSON key-value store for credentials

pub mod adapters;
pub mod assets;
pub mod bridge;
pub mod classify;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod errors;
pub mod http;
pub mod language;
pub mod normalize;
pub mod request;
pub mod runtime;
pub mod storage;
pub mod vfs;

pub use adapters::BackendAdapter;
pub use bridge::{BackgroundService, BridgeClient, BridgeMessage};
pub use classify::{assess, first_error, is_compile_error, is_server_error, ErrorKind, Verdict};
pub use config::*;
pub use dispatcher::CompileDispatcher;
pub use errors::{ExecutionError, WebcoderError};
pub use language::Language;
pub use normalize::normalize_output;
pub use request::{CompileRequest, CompileRequestPayload};
pub use runtime::WasiRuntime;

#[cfg(test)]
pub mod test_utils;
