//! Error classification over normalized output.
//!
//! Two independent detectors decide how the caller renders a result:
//! [`is_compile_error`] flags output that shows the submitted program is
//! defective, [`is_server_error`] flags output that is one of the fixed
//! infrastructure messages. Remote failures that carry an HTTP status are
//! mapped to an [`ErrorKind`] by [`classify_http_status`]. Nothing here
//! fails; output neither detector recognizes is an ordinary result.

use crate::language::Language;
use crate::normalize::trim_line_by_line;
use once_cell::sync::Lazy;
use regex::RegexSet;

/// Fixed user-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimited,
    InvalidRequest,
    RemoteCompileFailed,
    ServerError,
    MissingConfiguration,
    LocalExecutionFailed,
    NetworkFailure,
    BridgeFailure,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::RateLimited,
        ErrorKind::InvalidRequest,
        ErrorKind::RemoteCompileFailed,
        ErrorKind::ServerError,
        ErrorKind::MissingConfiguration,
        ErrorKind::LocalExecutionFailed,
        ErrorKind::NetworkFailure,
        ErrorKind::BridgeFailure,
    ];

    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => {
                "Execution API rate limit exceeded. Please wait a moment and try again."
            }
            ErrorKind::InvalidRequest => {
                "Execution API rejected the request. Check the remote backend configuration."
            }
            ErrorKind::RemoteCompileFailed => "Remote compilation failed.",
            ErrorKind::ServerError => "Execution API server error. Please try again later.",
            ErrorKind::MissingConfiguration => {
                "JDoodle API credentials are not configured. Save a client ID and secret first."
            }
            ErrorKind::LocalExecutionFailed => "WASM local execution failed.",
            ErrorKind::NetworkFailure => {
                "Failed to reach the execution API. Check your network connection."
            }
            ErrorKind::BridgeFailure => "Compile request failed.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Maps a remote API status to its taxonomy entry. 429 is checked first.
pub fn classify_http_status(status: u16) -> ErrorKind {
    if status == 429 {
        return ErrorKind::RateLimited;
    }
    if (400..410).contains(&status) {
        return ErrorKind::InvalidRequest;
    }
    if status == 417 {
        return ErrorKind::RemoteCompileFailed;
    }
    ErrorKind::ServerError
}

fn regex_set(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns).expect("valid signature patterns")
}

static CPP_COMPILE_ERRORS: Lazy<RegexSet> = Lazy::new(|| {
    regex_set(&[
        r"(?m)/program(:\d+:\d+)?:\s*(fatal\s+)?error:",
        r"(?m)wasm-ld:\s*error:",
        r"(?m)clang:\s*error:",
    ])
});

static PYTHON_COMPILE_ERRORS: Lazy<RegexSet> = Lazy::new(|| {
    regex_set(&[
        r"Traceback \(most recent call last\):",
        r"SyntaxError:",
        r"IndentationError:",
        r"TabError:",
        r#"File "/program\.py", line \d+"#,
    ])
});

static RUST_COMPILE_ERRORS: Lazy<RegexSet> =
    Lazy::new(|| regex_set(&[r"error(\[[E0-9]+\])?:", r"--> .*\.rs:\d+:\d+"]));

static JAVA_COMPILE_ERRORS: Lazy<RegexSet> = Lazy::new(|| {
    regex_set(&[
        r"(?m)^.*\.java:\d+:\s*error:",
        r"Could not find or load main class",
        r#"Exception in thread "main" java\.lang\."#,
    ])
});

static SERVER_ERRORS: Lazy<RegexSet> = Lazy::new(|| {
    let mut patterns: Vec<String> = vec![
        r"(?i)execution API error \(\d+\)".to_string(),
        r"(?i)execution failed\.".to_string(),
        r"(?i)Failed to fetch".to_string(),
        r"(?i)NetworkError".to_string(),
        r"(?i)Unsupported language:".to_string(),
    ];
    patterns.extend(
        ErrorKind::ALL
            .iter()
            .map(|kind| regex::escape(kind.message())),
    );
    RegexSet::new(&patterns).expect("valid server signature patterns")
});

/// Whether `output` shows the program failed to build (or, for Python, died
/// with a traceback).
pub fn is_compile_error(language: Language, output: &str) -> bool {
    let signatures = match language {
        Language::Cpp17 | Language::Cpp20 => &*CPP_COMPILE_ERRORS,
        Language::Python3 => &*PYTHON_COMPILE_ERRORS,
        Language::Rust => &*RUST_COMPILE_ERRORS,
        Language::Java => &*JAVA_COMPILE_ERRORS,
    };
    signatures.is_match(output)
}

pub fn is_server_error(output: &str) -> bool {
    SERVER_ERRORS.is_match(output)
}

/// How the caller should render one result string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    CompileError,
    InfraError,
}

/// Infrastructure signatures win over compile signatures.
pub fn assess(language: Language, output: &str) -> Verdict {
    if is_server_error(output) {
        Verdict::InfraError
    } else if is_compile_error(language, output) {
        Verdict::CompileError
    } else {
        Verdict::Ok
    }
}

/// First output in test-case order that either detector flags.
pub fn first_error<'a, S: AsRef<str>>(
    language: Language,
    outputs: &'a [S],
) -> Option<(Verdict, &'a str)> {
    outputs
        .iter()
        .map(AsRef::as_ref)
        .map(|output| (assess(language, output), output))
        .find(|(verdict, _)| *verdict != Verdict::Ok)
}

/// Compares expected and actual output ignoring trailing whitespace on each
/// line and blank lines at either end.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    trim_line_by_line(expected) == trim_line_by_line(actual)
}
