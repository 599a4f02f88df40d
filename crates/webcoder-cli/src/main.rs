use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use webcoder_core::bridge::BackgroundService;
use webcoder_core::classify::{assess, first_error, outputs_match, Verdict};
use webcoder_core::config::{load_config, WebcoderConfig};
use webcoder_core::credentials::{
    clear_credentials, load_credentials, save_credentials, JdoodleCredentials,
};
use webcoder_core::language::{language_for_submit_id, Language};
use webcoder_core::storage::LocalStorage;
use webcoder_core::{CompileDispatcher, CompileRequestPayload};

#[derive(Parser, Debug)]
#[clap(name = "webcoder", author, version, about = "Run judge solutions against test cases")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, default_value = "webcoder.yaml", help = "Configuration file")]
    config: PathBuf,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and run a source file against test cases
    Run {
        #[clap(long, short, help = "Source file to run")]
        source: PathBuf,

        #[clap(long, help = "Compiler language: cpp17, cpp20, java, python3 or rust")]
        language: Option<String>,

        #[clap(
            long,
            conflicts_with = "language",
            help = "Judge submit-form language id (e.g. 84, 95, 93, 28, 116)"
        )]
        language_id: Option<String>,

        #[clap(
            long = "input",
            short,
            help = "Test input file; a sibling file with the .out extension is the expected output"
        )]
        inputs: Vec<PathBuf>,

        #[clap(long, help = "Only check that the program builds")]
        compile_only: bool,

        #[clap(long, help = "Print results as JSON")]
        json: bool,
    },
    /// Manage the JDoodle API credentials
    Credentials {
        #[clap(subcommand)]
        action: CredentialsCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CredentialsCommands {
    /// Store a client ID and secret
    Set {
        #[clap(long)]
        client_id: String,
        #[clap(long)]
        client_secret: String,
    },
    /// Remove stored credentials
    Clear,
    /// Show whether credentials are stored
    Show,
}

struct TestCase {
    name: String,
    stdin: String,
    expected: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so program output on stdout stays clean
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .target(env_logger::Target::Stderr)
        .init();

    let config = load_config(&cli.config)
        .await
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            source,
            language,
            language_id,
            inputs,
            compile_only,
            json,
        } => {
            let (language, version_index) = resolve_language(language, language_id);
            run_cases(
                &config,
                &source,
                language,
                version_index,
                &inputs,
                compile_only,
                json,
            )
            .await
        }
        Commands::Credentials { action } => handle_credentials_command(&config, action).await,
    }
}

/// Explicit language names pass through untouched so unsupported ones are
/// reported by the dispatcher.
fn resolve_language(
    language: Option<String>,
    language_id: Option<String>,
) -> (String, Option<String>) {
    match (language, language_id) {
        (Some(language), _) => (language, None),
        (None, Some(id)) => {
            let (language, version_index) = language_for_submit_id(&id);
            (language.as_str().to_string(), Some(version_index.to_string()))
        }
        (None, None) => {
            let (language, version_index) =
                language_for_submit_id(webcoder_core::language::DEFAULT_LANGUAGE_ID);
            (language.as_str().to_string(), Some(version_index.to_string()))
        }
    }
}

fn expected_output_path(input: &Path) -> PathBuf {
    input.with_extension("out")
}

async fn load_test_cases(inputs: &[PathBuf]) -> Result<Vec<TestCase>> {
    if inputs.is_empty() {
        return Ok(vec![TestCase {
            name: "stdin".to_string(),
            stdin: String::new(),
            expected: None,
        }]);
    }

    let mut cases = Vec::with_capacity(inputs.len());
    for input in inputs {
        let stdin = tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read test input {}", input.display()))?;

        let expected_path = expected_output_path(input);
        let expected = if expected_path != *input && expected_path.exists() {
            Some(
                tokio::fs::read_to_string(&expected_path)
                    .await
                    .with_context(|| {
                        format!("Failed to read expected output {}", expected_path.display())
                    })?,
            )
        } else {
            None
        };

        cases.push(TestCase {
            name: input.display().to_string(),
            stdin,
            expected,
        });
    }
    Ok(cases)
}

async fn run_cases(
    config: &WebcoderConfig,
    source: &Path,
    language: String,
    version_index: Option<String>,
    inputs: &[PathBuf],
    compile_only: bool,
    json_output: bool,
) -> Result<()> {
    let script = tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read source file {}", source.display()))?;
    let cases = load_test_cases(inputs).await?;

    let dispatcher = Arc::new(CompileDispatcher::from_config(config)?);
    let (client, _service) =
        BackgroundService::spawn(dispatcher, config.bridge.response_timeout());

    let payloads: Vec<CompileRequestPayload> = cases
        .iter()
        .map(|case| CompileRequestPayload {
            language: language.clone(),
            script: script.clone(),
            stdin: Some(case.stdin.clone()),
            version_index: version_index.clone(),
            compile_only: compile_only.then_some(true),
        })
        .collect();

    log::info!("Running {} test case(s) as {}", payloads.len(), language);
    let outputs = client.request_compile_all(&payloads).await;

    // Unsupported names still classify as infrastructure errors, so any
    // language works for the verdicts
    let classify_as = language.parse::<Language>().unwrap_or(Language::Rust);

    let mut failures = 0;
    let mut results = Vec::with_capacity(cases.len());
    for (case, output) in cases.iter().zip(&outputs) {
        let verdict = assess(classify_as, output);
        let passed = match (&case.expected, verdict) {
            (_, Verdict::CompileError) | (_, Verdict::InfraError) => Some(false),
            (Some(expected), Verdict::Ok) => Some(outputs_match(expected, output)),
            (None, Verdict::Ok) => None,
        };
        if passed == Some(false) {
            failures += 1;
        }
        results.push((case, output, verdict, passed));
    }

    if json_output {
        let report: Vec<_> = results
            .iter()
            .map(|(case, output, verdict, passed)| {
                json!({
                    "case": case.name,
                    "output": output,
                    "verdict": format!("{:?}", verdict),
                    "passed": passed,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some((verdict, message)) = first_error(classify_as, &outputs) {
        let label = match verdict {
            Verdict::CompileError => "Compile error",
            _ => "Error",
        };
        println!("{}:\n{}", label, message);
    } else {
        for (case, output, _, passed) in &results {
            let status = match passed {
                Some(true) => "PASS",
                Some(false) => "FAIL",
                None => "DONE",
            };
            println!("[{}] {}", status, case.name);
            if !output.is_empty() {
                println!("{}", output);
            }
            if *passed == Some(false) {
                if let Some(expected) = &case.expected {
                    println!("--- expected ---\n{}", expected.trim_end());
                }
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} test case(s) failed", failures, cases.len());
    }
    Ok(())
}

async fn handle_credentials_command(
    config: &WebcoderConfig,
    action: CredentialsCommands,
) -> Result<()> {
    let storage = LocalStorage::new(&config.storage_path);

    match action {
        CredentialsCommands::Set {
            client_id,
            client_secret,
        } => {
            save_credentials(&storage, &JdoodleCredentials::new(client_id, client_secret)).await?;
            println!("JDoodle credentials saved to {}", storage.path().display());
        }
        CredentialsCommands::Clear => {
            clear_credentials(&storage).await?;
            println!("JDoodle credentials cleared");
        }
        CredentialsCommands::Show => match load_credentials(&storage).await {
            Some(credentials) => {
                println!("Client ID:     {}", credentials.client_id);
                println!("Client secret: {}", mask(&credentials.client_secret));
            }
            None => println!("No JDoodle credentials stored"),
        },
    }

    Ok(())
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let hidden = chars.len().saturating_sub(4);
    if hidden == 0 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_language() {
        assert_eq!(
            resolve_language(Some("cobol".to_string()), None),
            ("cobol".to_string(), None)
        );
        assert_eq!(
            resolve_language(None, Some("116".to_string())),
            ("rust".to_string(), Some("5".to_string()))
        );
        assert_eq!(
            resolve_language(None, Some("9999".to_string())),
            ("cpp20".to_string(), Some("2".to_string()))
        );
        assert_eq!(resolve_language(None, None).0, "cpp20");
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask("abcdefgh"), "****efgh");
        assert_eq!(mask("abc"), "***");
    }

    #[tokio::test]
    async fn test_load_test_cases_pairs_expected_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("1.in");
        std::fs::write(&input, "1 2\n").unwrap();
        std::fs::write(dir.path().join("1.out"), "3\n").unwrap();
        let lonely = dir.path().join("2.in");
        std::fs::write(&lonely, "5\n").unwrap();

        let cases = load_test_cases(&[input, lonely]).await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].stdin, "1 2\n");
        assert_eq!(cases[0].expected.as_deref(), Some("3\n"));
        assert!(cases[1].expected.is_none());
    }

    #[tokio::test]
    async fn test_no_inputs_means_one_empty_case() {
        let cases = load_test_cases(&[]).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert!(cases[0].stdin.is_empty());
    }
}
