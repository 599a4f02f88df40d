use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webcoder_core::adapters::{BackendAdapter, PistonAdapter, WasmAdapter};
use webcoder_core::assets::{
    AssetCache, DirAssetSource, PYTHON_BASE_FS_TAR_GZ_PATH, PYTHON_WASM_PATH,
};
use webcoder_core::bridge::{fallback_message, BackgroundService};
use webcoder_core::classify::{first_error, outputs_match, Verdict};
use webcoder_core::errors::ExecutionError;
use webcoder_core::http::RetryPolicy;
use webcoder_core::language::{language_for_submit_id, Language};
use webcoder_core::runtime::{ExecutionResult, WasiCommand, WasiRuntime};
use webcoder_core::vfs::FsSnapshot;
use webcoder_core::{CompileDispatcher, CompileRequestPayload};

/// Interpreter stand-in: echoes stdin doubled, or fails on a lone `(`.
struct EchoPython {
    seen_stdlib: Mutex<Vec<bool>>,
}

#[async_trait]
impl WasiRuntime for EchoPython {
    async fn run(
        &self,
        command: WasiCommand,
        fs: FsSnapshot,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.seen_stdlib
            .lock()
            .unwrap()
            .push(fs.contains("/lib/python3.11/os.py"));

        let source = fs
            .get("/program.py")
            .map(|entry| String::from_utf8_lossy(entry.content.as_bytes()).into_owned())
            .unwrap_or_default();

        let (exit_code, output) = if source.contains('(') && !source.contains(')') {
            (
                1,
                "  File \"/program.py\", line 1\nSyntaxError: '(' was never closed\n".to_string(),
            )
        } else {
            let n: i64 = command
                .stdin
                .as_deref()
                .unwrap_or_default()
                .trim()
                .parse()
                .unwrap_or(0);
            (0, format!("{}   \n\n", n * 2))
        };

        Ok(ExecutionResult {
            exit_code,
            output,
            fs,
        })
    }
}

fn write_python_bundle(dir: &std::path::Path) {
    std::fs::create_dir_all(dir.join("wasm")).unwrap();
    std::fs::write(dir.join(PYTHON_WASM_PATH), b"\0asm-python").unwrap();

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let content = b"import posix\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "lib/python3.11/os.py", &content[..])
        .unwrap();
    let archive = builder.into_inner().unwrap().finish().unwrap();
    std::fs::write(dir.join(PYTHON_BASE_FS_TAR_GZ_PATH), archive).unwrap();
}

fn python_dispatcher(bundle: &std::path::Path, runtime: Arc<EchoPython>) -> CompileDispatcher {
    let assets = Arc::new(AssetCache::new(Arc::new(DirAssetSource::new(bundle))));
    let local: Arc<dyn BackendAdapter> = Arc::new(WasmAdapter::new(runtime, assets));
    let remote: Arc<dyn BackendAdapter> = Arc::new(
        PistonAdapter::new(Duration::from_secs(5))
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/api/v2/piston/execute"),
    );
    CompileDispatcher::new(Some(local), remote)
}

fn python_case(script: &str, stdin: &str) -> CompileRequestPayload {
    let (language, version_index) = language_for_submit_id("28");
    CompileRequestPayload {
        language: language.as_str().to_string(),
        script: script.to_string(),
        stdin: Some(stdin.to_string()),
        version_index: Some(version_index.to_string()),
        compile_only: None,
    }
}

#[tokio::test]
async fn test_test_cases_run_concurrently_through_the_bridge() {
    let bundle = tempfile::tempdir().unwrap();
    write_python_bundle(bundle.path());
    let runtime = Arc::new(EchoPython {
        seen_stdlib: Mutex::new(Vec::new()),
    });

    let dispatcher = Arc::new(python_dispatcher(bundle.path(), runtime.clone()));
    let (client, _service) = BackgroundService::spawn(dispatcher, Duration::from_secs(10));

    let cases: Vec<_> = (1..=5)
        .map(|n| python_case("print(int(input())*2)", &n.to_string()))
        .collect();
    let outputs = client.request_compile_all(&cases).await;

    assert_eq!(outputs, vec!["2", "4", "6", "8", "10"]);
    for (n, output) in (1..=5).zip(&outputs) {
        assert!(outputs_match(&format!("{}\n", n * 2), output));
    }
    assert_eq!(first_error(Language::Python3, &outputs), None);

    let seen = runtime.seen_stdlib.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|present| *present));
}

#[tokio::test]
async fn test_syntax_error_is_reported_as_compile_error() {
    let bundle = tempfile::tempdir().unwrap();
    write_python_bundle(bundle.path());
    let runtime = Arc::new(EchoPython {
        seen_stdlib: Mutex::new(Vec::new()),
    });

    let dispatcher = Arc::new(python_dispatcher(bundle.path(), runtime));
    let (client, _service) = BackgroundService::spawn(dispatcher, Duration::from_secs(10));

    let outputs = client
        .request_compile_all(&[python_case("print(", "1"), python_case("print(", "2")])
        .await;

    let (verdict, message) = first_error(Language::Python3, &outputs).unwrap();
    assert_eq!(verdict, Verdict::CompileError);
    assert!(message.contains("SyntaxError"));
}

#[tokio::test]
async fn test_missing_bundle_and_unreachable_api_still_answer() {
    let empty = tempfile::tempdir().unwrap();
    let runtime = Arc::new(EchoPython {
        seen_stdlib: Mutex::new(Vec::new()),
    });
    let assets = Arc::new(AssetCache::new(Arc::new(DirAssetSource::new(empty.path()))));
    let local: Arc<dyn BackendAdapter> = Arc::new(WasmAdapter::new(runtime, assets));
    // nothing listens on port 9 of the loopback interface
    let remote: Arc<dyn BackendAdapter> = Arc::new(
        PistonAdapter::new(Duration::from_secs(5))
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/api/v2/piston/execute")
            .with_retry_policy(RetryPolicy {
                base_delay_ms: 1,
                max_delay_ms: 5,
                jitter_ms: 0,
                ..Default::default()
            }),
    );
    let dispatcher = Arc::new(CompileDispatcher::new(Some(local), remote));

    let (client, _service) = BackgroundService::spawn(dispatcher, Duration::from_secs(10));
    let outputs = client
        .request_compile_all(&[
            python_case("print(1)", ""),
            CompileRequestPayload {
                language: "rust".to_string(),
                script: "fn main() {}".to_string(),
                ..Default::default()
            },
        ])
        .await;

    assert_eq!(outputs[0], "WASM local execution failed.");
    assert!(outputs[1].starts_with("Failed to reach the execution API"));
    assert_ne!(outputs[1], fallback_message());

    let (verdict, _) = first_error(Language::Python3, &outputs).unwrap();
    assert_eq!(verdict, Verdict::InfraError);
}
