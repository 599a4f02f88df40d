//! Execution backend adapters.
//!
//! Each adapter turns a [`CompileRequest`] into raw program output. A program
//! that failed to build or exited non-zero is still an `Ok` result whose text
//! explains the failure; `Err` is reserved for the infrastructure itself
//! (unreachable API, missing assets, broken runtime).

use crate::errors::ExecutionError;
use crate::request::CompileRequest;
use async_trait::async_trait;

pub mod jdoodle;
pub mod piston;
pub mod wasm;

pub use jdoodle::JdoodleAdapter;
pub use piston::PistonAdapter;
pub use wasm::WasmAdapter;

#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Short backend name used in logs and error messages.
    fn name(&self) -> &'static str;

    async fn execute(&self, request: &CompileRequest) -> Result<String, ExecutionError>;
}
