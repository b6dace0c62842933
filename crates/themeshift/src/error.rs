//! Error types for the themeshift crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while parsing, resolving or rewriting stylesheets.
///
/// Missing and cyclic variable references are deliberately *not* errors: they
/// resolve to an empty string (see [`crate::resolver`]).
#[derive(Debug, Error)]
pub enum ThemeError {
    /// The stylesheet source could not be turned into a tree.
    #[error("failed to parse {}:{line}:{column}: {message}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        line: usize,
        column: usize,
        message: String,
    },

    /// A value contained tokens the tokenizer rejects (bad url, bad string,
    /// invalid `var()` body).
    #[error("malformed value '{value}': {message}")]
    MalformedValue { value: String, message: String },

    /// An import specifier could not be resolved to a file.
    #[error("cannot resolve import '{specifier}' from {}: {message}", .base_dir.display())]
    Resolve {
        specifier: String,
        base_dir: PathBuf,
        message: String,
    },

    /// Reading a source file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<inline>".to_string())
}

impl From<serde_yaml::Error> for ThemeError {
    fn from(err: serde_yaml::Error) -> Self {
        ThemeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ThemeError {
    fn from(err: serde_json::Error) -> Self {
        ThemeError::Config(err.to_string())
    }
}

/// Result type for themeshift operations.
pub type Result<T> = std::result::Result<T, ThemeError>;
