// src/runtime/wasmtime_runtime.rs
use std::path::Path;

use async_trait::async_trait;
use wasmtime::{Config, Engine, Linker, Module, Store};
use wasmtime_wasi::p1::{self, WasiP1Ctx};
use wasmtime_wasi::p2::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

use super::{ExecutionResult, WasiCommand, WasiRuntime};
use crate::errors::ExecutionError;
use crate::vfs::FsSnapshot;

/// Matches the sentinel the output normalizer rewrites.
const OUTPUT_LIMIT_SENTINEL: &str = "output limit reached";
const DEFAULT_OUTPUT_LIMIT: usize = 8 * 1024 * 1024;

/// Runs WASI preview1 modules with wasmtime.
///
/// The snapshot is written into a throwaway host directory that is preopened
/// as the guest's `/`; after the module exits the directory is read back into
/// a fresh snapshot, so the next pipeline step sees every file the module
/// produced.
#[derive(Clone)]
pub struct WasmtimeRuntime {
    engine: Engine,
    output_limit: usize,
}

impl WasmtimeRuntime {
    pub fn new() -> Result<Self, ExecutionError> {
        let engine = Engine::new(&Config::new()).map_err(runtime_error)?;
        Ok(Self {
            engine,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        })
    }
}

fn runtime_error(err: impl std::fmt::Display) -> ExecutionError {
    ExecutionError::Runtime(err.to_string())
}

fn run_blocking(
    engine: &Engine,
    output_limit: usize,
    command: WasiCommand,
    fs: FsSnapshot,
) -> Result<ExecutionResult, ExecutionError> {
    let sandbox = tempfile::Builder::new()
        .prefix("webcoder-wasi-")
        .tempdir()?;
    fs.write_to_dir(sandbox.path())?;

    let module = Module::new(engine, &command.module[..]).map_err(runtime_error)?;
    let output = MemoryOutputPipe::new(output_limit);
    let ctx = build_context(&command, sandbox.path(), &output)?;

    let mut linker: Linker<WasiP1Ctx> = Linker::new(engine);
    p1::add_to_linker_sync(&mut linker, |ctx| ctx).map_err(runtime_error)?;

    let mut store = Store::new(engine, ctx);
    let instance = linker
        .instantiate(&mut store, &module)
        .map_err(runtime_error)?;
    let start = instance
        .get_typed_func::<(), ()>(&mut store, "_start")
        .map_err(runtime_error)?;

    let mut trap_message = None;
    let exit_code = match start.call(&mut store, ()) {
        Ok(()) => 0,
        Err(err) => match err.downcast_ref::<I32Exit>() {
            Some(exit) => exit.0,
            None => {
                log::warn!("{} trapped: {}", command.name, err);
                trap_message = Some(err.to_string());
                1
            }
        },
    };
    drop(store);

    let contents = output.contents();
    let mut text = String::from_utf8_lossy(&contents).into_owned();
    if contents.len() >= output_limit {
        text.push('\n');
        text.push_str(OUTPUT_LIMIT_SENTINEL);
    }
    if let Some(message) = trap_message {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&message);
    }

    let fs = FsSnapshot::read_from_dir(sandbox.path())?;
    log::debug!(
        "{} exited with code {} ({} bytes of output)",
        command.name,
        exit_code,
        contents.len()
    );

    Ok(ExecutionResult {
        exit_code,
        output: text,
        fs,
    })
}

fn build_context(
    command: &WasiCommand,
    root: &Path,
    output: &MemoryOutputPipe,
) -> Result<WasiP1Ctx, ExecutionError> {
    let mut builder = WasiCtxBuilder::new();
    builder.args(&command.argv());
    builder.stdin(MemoryInputPipe::new(command.stdin.clone().unwrap_or_default()));
    builder.stdout(output.clone());
    builder.stderr(output.clone());
    builder
        .preopened_dir(root, "/", DirPerms::all(), FilePerms::all())
        .map_err(runtime_error)?;
    Ok(builder.build_p1())
}

#[async_trait]
impl WasiRuntime for WasmtimeRuntime {
    async fn run(
        &self,
        command: WasiCommand,
        fs: FsSnapshot,
    ) -> Result<ExecutionResult, ExecutionError> {
        let engine = self.engine.clone();
        let output_limit = self.output_limit;
        tokio::task::spawn_blocking(move || run_blocking(&engine, output_limit, command, fs))
            .await
            .map_err(runtime_error)?
    }
}
