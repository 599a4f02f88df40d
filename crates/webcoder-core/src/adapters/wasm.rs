//! In-process WASI adapter for C++ and Python.
//!
//! C++ goes through clang → wasm-ld → the produced module, each step running
//! on the filesystem the previous step returned. Python runs the interpreter
//! directly on its prebuilt standard-library image. A non-zero exit anywhere
//! stops the pipeline and that step's output becomes the result.

use std::sync::Arc;

use async_trait::async_trait;

use super::BackendAdapter;
use crate::assets::{AssetCache, BaseImage, Binary};
use crate::errors::ExecutionError;
use crate::language::{CppStandard, Language};
use crate::request::CompileRequest;
use crate::runtime::{ExecutionResult, WasiCommand, WasiRuntime};
use crate::vfs::{FileContent, FsSnapshot};

pub const PROGRAM_SOURCE_PATH: &str = "/program";
pub const PROGRAM_OBJ_PATH: &str = "/program.o";
pub const PROGRAM_WASM_PATH: &str = "/program.wasm";
pub const PYTHON_SOURCE_PATH: &str = "/program.py";
pub const COMPAT_BITS_STDCXX_HEADER_PATH: &str = "/sys/include/bits/stdc++.h";

// GCC convenience header so judge templates using <bits/stdc++.h> build with clang.
const COMPAT_BITS_STDCXX_HEADER: &str = r#"#pragma once

#include <algorithm>
#include <array>
#include <bitset>
#include <cassert>
#include <chrono>
#include <cmath>
#include <cstdio>
#include <cstdlib>
#include <cstring>
#include <deque>
#include <functional>
#include <iomanip>
#include <iostream>
#include <limits>
#include <list>
#include <map>
#include <numeric>
#include <queue>
#include <set>
#include <sstream>
#include <stack>
#include <string>
#include <tuple>
#include <unordered_map>
#include <unordered_set>
#include <utility>
#include <vector>

using namespace std;
"#;

struct BuildStep {
    binary: Binary,
    name: &'static str,
    args: Vec<String>,
}

fn cpp_build_steps(standard: CppStandard) -> Vec<BuildStep> {
    let compile_args = [
        "-cc1",
        "-emit-obj",
        "-disable-free",
        "-isysroot",
        "/sys",
        "-internal-isystem",
        "/sys/include/c++/v1",
        "-internal-isystem",
        "/sys/include",
        "-internal-isystem",
        "/sys/lib/clang/8.0.1/include",
        "-ferror-limit",
        "4",
        "-fmessage-length",
        "80",
        "-fcolor-diagnostics",
        "-O2",
        standard.flag(),
        "-o",
        PROGRAM_OBJ_PATH,
        "-x",
        "c++",
        PROGRAM_SOURCE_PATH,
    ];
    let link_args = [
        "--no-threads",
        "--export-dynamic",
        "-z",
        "stack-size=1048576",
        "-L/sys/lib/wasm32-wasi",
        "/sys/lib/wasm32-wasi/crt1.o",
        PROGRAM_OBJ_PATH,
        "-lc",
        "-lc++",
        "-lc++abi",
        "-o",
        PROGRAM_WASM_PATH,
    ];

    vec![
        BuildStep {
            binary: Binary::Clang,
            name: "clang",
            args: compile_args.iter().map(|s| s.to_string()).collect(),
        },
        BuildStep {
            binary: Binary::WasmLd,
            name: "wasm-ld",
            args: link_args.iter().map(|s| s.to_string()).collect(),
        },
    ]
}

fn build_failure_message(result: &ExecutionResult) -> String {
    let output = result.output.trim();
    if output.is_empty() {
        format!("Compilation failed (exit code: {})", result.exit_code)
    } else {
        output.to_string()
    }
}

fn run_result_message(result: &ExecutionResult) -> String {
    let output = result.output.trim();
    if !output.is_empty() {
        output.to_string()
    } else if result.exit_code != 0 {
        format!("Process exited abnormally (exit code: {})", result.exit_code)
    } else {
        String::new()
    }
}

pub struct WasmAdapter {
    runtime: Arc<dyn WasiRuntime>,
    assets: Arc<AssetCache>,
}

impl WasmAdapter {
    pub fn new(runtime: Arc<dyn WasiRuntime>, assets: Arc<AssetCache>) -> Self {
        Self { runtime, assets }
    }

    async fn execute_cpp(
        &self,
        request: &CompileRequest,
        standard: CppStandard,
    ) -> Result<String, ExecutionError> {
        let seed = FsSnapshot::new()
            .with_text(PROGRAM_SOURCE_PATH, request.script.as_str())
            .with_text(COMPAT_BITS_STDCXX_HEADER_PATH, COMPAT_BITS_STDCXX_HEADER);
        let mut fs = self.assets.base_fs(BaseImage::Clang).await?.overlay(seed);

        for step in cpp_build_steps(standard) {
            let module = self.assets.binary(step.binary).await?;
            log::debug!("Running {} build step", step.name);
            let command = WasiCommand::new(step.name, module).with_args(step.args);
            let result = self.runtime.run(command, fs).await?;
            if !result.succeeded() {
                log::debug!("{} failed with exit code {}", step.name, result.exit_code);
                return Ok(build_failure_message(&result));
            }
            fs = result.fs;
        }

        if request.compile_only {
            return Ok(String::new());
        }

        let program: Arc<[u8]> = match fs.get(PROGRAM_WASM_PATH).map(|entry| &entry.content) {
            Some(FileContent::Binary(bytes)) => Arc::clone(bytes),
            Some(FileContent::Text(text)) => Arc::from(text.as_bytes()),
            None => return Err(ExecutionError::MissingBinary(PROGRAM_WASM_PATH.to_string())),
        };

        let command = WasiCommand::new("program", program).with_stdin(request.stdin.clone());
        let result = self.runtime.run(command, fs).await?;
        Ok(run_result_message(&result))
    }

    async fn execute_python(&self, request: &CompileRequest) -> Result<String, ExecutionError> {
        let fs = self
            .assets
            .base_fs(BaseImage::Python)
            .await?
            .with_text(PYTHON_SOURCE_PATH, request.script.as_str());
        let module = self.assets.binary(Binary::Python).await?;

        let command = if request.compile_only {
            WasiCommand::new("python", module).with_args(["-m", "py_compile", PYTHON_SOURCE_PATH])
        } else {
            WasiCommand::new("python", module)
                .with_args([PYTHON_SOURCE_PATH])
                .with_stdin(request.stdin.clone())
        };

        let result = self.runtime.run(command, fs).await?;
        Ok(run_result_message(&result))
    }
}

#[async_trait]
impl BackendAdapter for WasmAdapter {
    fn name(&self) -> &'static str {
        "wasm"
    }

    async fn execute(&self, request: &CompileRequest) -> Result<String, ExecutionError> {
        match request.language {
            Language::Cpp17 | Language::Cpp20 => {
                let standard = request
                    .language
                    .cpp_standard()
                    .unwrap_or(CppStandard::Cpp17);
                self.execute_cpp(request, standard).await
            }
            Language::Python3 => self.execute_python(request).await,
            Language::Java | Language::Rust => Err(ExecutionError::Runtime(format!(
                "{} is not available on the local WASI backend",
                request.language.display_name()
            ))),
        }
    }
}
