//! Output normalization.
//!
//! Turns raw backend output into the string shown in a test-case panel.
//! Noise that only the backend produces is removed, every line is
//! right-trimmed, and the two resource-limit sentinels collapse into short
//! canonical phrases. Input that matches nothing passes through unchanged.

use crate::language::Language;
use once_cell::sync::Lazy;
use regex::Regex;

pub const OUTPUT_LIMIT_EXCEEDED: &str = "Output limit exceeded";
pub const TIME_LIMIT_EXCEEDED: &str = "Time limit exceeded";

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI regex"));

// clang's trailing summary after a build that only warned
static WARNING_BANNER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\d+ warnings? generated\.[ \t]*(\r?\n|$)").expect("valid banner regex")
});

// Piston runs every job from a scratch directory like /piston/jobs/<uuid>/
static PISTON_JOB_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/piston/jobs/[0-9A-Za-z-]+/").expect("valid job path regex"));

static OUTPUT_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)output limit reached").expect("valid sentinel regex"));

static TIME_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)timed out|timeout").expect("valid sentinel regex"));

/// Right-trims every line and drops leading and trailing blank lines.
pub fn trim_line_by_line(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    lines.join("\n").trim_matches('\n').to_string()
}

fn strip_noise(language: Language, raw: &str) -> String {
    let text = ANSI_ESCAPE.replace_all(raw, "");
    match language {
        Language::Cpp17 | Language::Cpp20 => WARNING_BANNER.replace_all(&text, "").into_owned(),
        Language::Java | Language::Rust => PISTON_JOB_PATH.replace_all(&text, "").into_owned(),
        Language::Python3 => text.into_owned(),
    }
}

pub fn normalize_output(language: Language, raw: &str) -> String {
    let cleaned = trim_line_by_line(&strip_noise(language, raw));

    if OUTPUT_LIMIT.is_match(&cleaned) {
        return OUTPUT_LIMIT_EXCEEDED.to_string();
    }
    if TIME_LIMIT.is_match(&cleaned) {
        return TIME_LIMIT_EXCEEDED.to_string();
    }
    cleaned
}
