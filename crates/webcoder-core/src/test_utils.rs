//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::adapters::BackendAdapter;
use crate::assets::AssetSource;
use crate::errors::ExecutionError;
use crate::request::CompileRequest;
use crate::runtime::{ExecutionResult, WasiCommand, WasiRuntime};
use crate::vfs::{FileContent, FsSnapshot};

pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// In-memory asset bundle that counts fetches per path.
#[derive(Default)]
pub struct MemoryAssetSource {
    assets: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(self, path: &str, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, path: &str, data: Vec<u8>) {
        self.assets.lock().unwrap().insert(path.to_string(), data);
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AssetSource for MemoryAssetSource {
    async fn fetch(&self, relative_path: &str) -> Result<Vec<u8>, ExecutionError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(relative_path.to_string())
            .or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.assets
            .lock()
            .unwrap()
            .get(relative_path)
            .cloned()
            .ok_or_else(|| ExecutionError::AssetFetch {
                path: relative_path.to_string(),
                message: "not found".to_string(),
            })
    }
}

/// Scripted stand-in for a WASI runtime that imitates the clang, wasm-ld and
/// python toolchain closely enough to exercise the pipelines.
#[derive(Default)]
pub struct FakeRuntime {
    calls: Mutex<Vec<WasiCommand>>,
    seen: Mutex<Vec<FsSnapshot>>,
}

fn read_text(fs: &FsSnapshot, path: &str) -> Option<String> {
    fs.get(path)
        .map(|entry| String::from_utf8_lossy(entry.content.as_bytes()).into_owned())
}

impl FakeRuntime {
    pub fn toolchain() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<WasiCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn seen_fs(&self, index: usize) -> FsSnapshot {
        self.seen.lock().unwrap()[index].clone()
    }

    fn clang(fs: FsSnapshot) -> ExecutionResult {
        let source = read_text(&fs, "/program").unwrap_or_default();
        if source.contains("0 }") {
            return ExecutionResult {
                exit_code: 1,
                output: "\u{1b}[1m/program:1:22: \u{1b}[0;1;31merror: \u{1b}[0mexpected ';' after return statement\nint main(){ return 0 }\n                     ^\n1 error generated.\n".to_string(),
                fs,
            };
        }
        let mut fs = fs;
        fs.insert("/program.o", FileContent::Text(source));
        ExecutionResult {
            exit_code: 0,
            output: String::new(),
            fs,
        }
    }

    fn wasm_ld(fs: FsSnapshot) -> ExecutionResult {
        match read_text(&fs, "/program.o") {
            Some(object) => {
                let mut fs = fs;
                fs.insert("/program.wasm", FileContent::Binary(object.into_bytes().into()));
                ExecutionResult {
                    exit_code: 0,
                    output: String::new(),
                    fs,
                }
            }
            None => ExecutionResult {
                exit_code: 1,
                output: "wasm-ld: error: cannot open /program.o".to_string(),
                fs,
            },
        }
    }

    fn program(command: &WasiCommand, fs: FsSnapshot) -> ExecutionResult {
        let source = String::from_utf8_lossy(&command.module).into_owned();
        let (exit_code, output) = if source.contains("std::cin>>a>>b") {
            let sum: i64 = command
                .stdin
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .filter_map(|token| token.parse::<i64>().ok())
                .sum();
            (0, format!("{}\n", sum))
        } else if source.contains("std::cout<<7") {
            (0, "7\n".to_string())
        } else if source.contains("return 3;") {
            (3, String::new())
        } else {
            (0, String::new())
        };
        ExecutionResult {
            exit_code,
            output,
            fs,
        }
    }

    fn python(command: &WasiCommand, fs: FsSnapshot) -> ExecutionResult {
        let source = read_text(&fs, "/program.py").unwrap_or_default();
        let compile_only = command.args.first().map(String::as_str) == Some("-m");
        let (exit_code, output) = if source.trim_end().ends_with('(') {
            (
                1,
                "  File \"/program.py\", line 1\n    print(\n         ^\nSyntaxError: '(' was never closed\n"
                    .to_string(),
            )
        } else if compile_only {
            (0, String::new())
        } else if source.contains("print(1+1)") {
            (0, "2\n".to_string())
        } else if source.contains("input()") {
            (0, format!("{}\n", command.stdin.as_deref().unwrap_or_default().trim()))
        } else {
            (0, String::new())
        };
        ExecutionResult {
            exit_code,
            output,
            fs,
        }
    }
}

#[async_trait]
impl WasiRuntime for FakeRuntime {
    async fn run(
        &self,
        command: WasiCommand,
        fs: FsSnapshot,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.calls.lock().unwrap().push(command.clone());
        self.seen.lock().unwrap().push(fs.clone());
        let result = match command.name.as_str() {
            "clang" => Self::clang(fs),
            "wasm-ld" => Self::wasm_ld(fs),
            "python" => Self::python(&command, fs),
            _ => Self::program(&command, fs),
        };
        Ok(result)
    }
}

/// Adapter returning a fixed answer, counting invocations.
pub struct StaticAdapter {
    answer: Result<String, ExecutionError>,
    calls: AtomicUsize,
}

impl StaticAdapter {
    pub fn ok(output: &str) -> Self {
        Self {
            answer: Ok(output.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn err(error: ExecutionError) -> Self {
        Self {
            answer: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for StaticAdapter {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn execute(&self, _request: &CompileRequest) -> Result<String, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}
