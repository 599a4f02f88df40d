//! WASI virtual machine abstraction.
//!
//! A runtime executes one WebAssembly module against a filesystem snapshot
//! and hands back the exit status, the merged stdout/stderr text and the
//! filesystem as the module left it. Runtimes never touch the snapshot they
//! were given; the returned one is a new value.

use crate::errors::ExecutionError;
use crate::vfs::FsSnapshot;
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "wasmtime")]
pub mod wasmtime_runtime;

#[cfg(feature = "wasmtime")]
pub use wasmtime_runtime::WasmtimeRuntime;

#[derive(Debug, Clone)]
pub struct WasiCommand {
    /// Program name passed as `argv[0]`.
    pub name: String,
    pub module: Arc<[u8]>,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl WasiCommand {
    pub fn new(name: impl Into<String>, module: Arc<[u8]>) -> Self {
        Self {
            name: name.into(),
            module,
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stdin(mut self, stdin: Option<String>) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.name.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub output: String,
    pub fs: FsSnapshot,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait WasiRuntime: Send + Sync {
    async fn run(
        &self,
        command: WasiCommand,
        fs: FsSnapshot,
    ) -> Result<ExecutionResult, ExecutionError>;
}
