//! Supported source languages and the backend family each one runs on.
//!
//! Per-language tables such as compiler flags and error signatures match
//! exhaustively on [`Language`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "cpp17")]
    Cpp17,
    #[serde(rename = "cpp20")]
    Cpp20,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "python3")]
    Python3,
    #[serde(rename = "rust")]
    Rust,
}

/// Execution backend family a language is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFamily {
    /// In-process WASI virtual machine.
    Local,
    /// Third-party execution API over HTTP.
    Remote,
}

/// C++ language standard passed to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CppStandard {
    Cpp17,
    Cpp20,
}

impl CppStandard {
    pub fn flag(&self) -> &'static str {
        match self {
            CppStandard::Cpp17 => "-std=c++17",
            CppStandard::Cpp20 => "-std=c++20",
        }
    }
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Cpp17,
        Language::Cpp20,
        Language::Java,
        Language::Python3,
        Language::Rust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp17 => "cpp17",
            Language::Cpp20 => "cpp20",
            Language::Java => "java",
            Language::Python3 => "python3",
            Language::Rust => "rust",
        }
    }

    /// Human readable name used in synthesized messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Cpp17 | Language::Cpp20 => "C++",
            Language::Java => "Java",
            Language::Python3 => "Python",
            Language::Rust => "Rust",
        }
    }

    pub fn backend_family(&self) -> BackendFamily {
        match self {
            Language::Cpp17 | Language::Cpp20 | Language::Python3 => BackendFamily::Local,
            Language::Java | Language::Rust => BackendFamily::Remote,
        }
    }

    pub fn cpp_standard(&self) -> Option<CppStandard> {
        match self {
            Language::Cpp17 => Some(CppStandard::Cpp17),
            Language::Cpp20 => Some(CppStandard::Cpp20),
            Language::Java | Language::Python3 | Language::Rust => None,
        }
    }

    /// File name the remote backends expect the source under.
    pub fn remote_file_name(&self) -> &'static str {
        match self {
            Language::Cpp17 | Language::Cpp20 => "main.cpp",
            Language::Java => "Main.java",
            Language::Python3 => "main.py",
            Language::Rust => "main.rs",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a language identifier is outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedLanguage(pub String);

impl fmt::Display for UnsupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported language: {}", self.0)
    }
}

impl std::error::Error for UnsupportedLanguage {}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpp17" => Ok(Language::Cpp17),
            "cpp20" => Ok(Language::Cpp20),
            "java" => Ok(Language::Java),
            "python3" => Ok(Language::Python3),
            "rust" => Ok(Language::Rust),
            other => Err(UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Submit-form language id used when the page offers an unknown one.
pub const DEFAULT_LANGUAGE_ID: &str = "95";

/// Maps a judge submit-form language id to the compiler language and the
/// version index sent to version-aware backends.
pub fn language_for_submit_id(language_id: &str) -> (Language, &'static str) {
    match language_id {
        "84" => (Language::Cpp17, "2"),
        "95" => (Language::Cpp20, "2"),
        "93" => (Language::Java, "3"),
        "28" => (Language::Python3, "5"),
        "116" => (Language::Rust, "5"),
        _ => language_for_submit_id(DEFAULT_LANGUAGE_ID),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_identifiers() {
        for language in Language::ALL {
            assert_eq!(language.as_str().parse::<Language>(), Ok(language));
        }
    }

    #[test]
    fn test_unknown_language_message() {
        let err = "cobol".parse::<Language>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported language: cobol");
    }

    #[test]
    fn test_backend_routing() {
        assert_eq!(Language::Cpp17.backend_family(), BackendFamily::Local);
        assert_eq!(Language::Python3.backend_family(), BackendFamily::Local);
        assert_eq!(Language::Rust.backend_family(), BackendFamily::Remote);
        assert_eq!(Language::Java.backend_family(), BackendFamily::Remote);
    }

    #[test]
    fn test_submit_id_mapping_falls_back_to_default() {
        assert_eq!(language_for_submit_id("116"), (Language::Rust, "5"));
        assert_eq!(language_for_submit_id("84"), (Language::Cpp17, "2"));
        assert_eq!(language_for_submit_id("9999"), (Language::Cpp20, "2"));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Language::Python3).unwrap();
        assert_eq!(json, "\"python3\"");
    }
}
