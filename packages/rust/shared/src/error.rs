//! Error types for docsagent.
//!
//! Library crates use [`DocsAgentError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Negative outcomes that are not failures (a locator that matches no heading,
//! a sitemap document of unknown shape, a section cut at the size limit) are
//! modelled as values by the crates that produce them, never as errors here.

use std::path::PathBuf;

/// Top-level error type for all docsagent operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsAgentError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A fetch completed with a non-success status.
    #[error("fetch failed: {url}: HTTP {status}")]
    Http { url: String, status: u16 },

    /// Transport failure before a response status was available.
    #[error("network error: {0}")]
    Network(String),

    /// The URL lies outside the configured documentation scope. No request was made.
    #[error("out of scope: {url}")]
    OutOfScope { url: String },

    /// Malformed XML or HTML input.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid caller input (bad URL, zero size limit, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsAgentError>;

impl DocsAgentError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Non-success fetch outcome for `url`.
    pub fn http(url: impl Into<String>, status: u16) -> Self {
        Self::Http {
            url: url.into(),
            status,
        }
    }

    /// Rejection of a URL outside the configured scope.
    pub fn out_of_scope(url: impl Into<String>) -> Self {
        Self::OutOfScope { url: url.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The URL this error is about, if it names one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Http { url, .. } | Self::OutOfScope { url } => Some(url),
            _ => None,
        }
    }
}
