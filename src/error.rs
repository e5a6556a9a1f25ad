// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for Kuriiri
//!
//! The first group of variants is the user-visible taxonomy of a request run
//! (script failures, transport failures, pre-request failures). The rest is
//! plumbing from the libraries underneath.

use std::fmt;

use thiserror::Error;

pub use crate::model::CaptureSource;

/// Result type alias for Kuriiri operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a script ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptStage {
    CollectionPre,
    RequestPre,
    RequestPost,
    CollectionPost,
    /// A script run directly, outside any request pipeline
    Standalone,
}

impl fmt::Display for ScriptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptStage::CollectionPre => "collection pre-script",
            ScriptStage::RequestPre => "request pre-script",
            ScriptStage::RequestPost => "request post-script",
            ScriptStage::CollectionPost => "collection post-script",
            ScriptStage::Standalone => "script",
        };
        f.write_str(name)
    }
}

/// Main error type for Kuriiri
#[derive(Error, Debug)]
pub enum Error {
    /// A script threw
    #[error("{stage} failed: {message}")]
    ScriptFailure { stage: ScriptStage, message: String },

    /// A script exceeded its wall-clock budget
    #[error("{stage} exceeded time budget of {timeout_ms}ms")]
    ScriptTimeout { stage: ScriptStage, timeout_ms: u64 },

    /// Network, DNS or TLS level failure of the underlying call
    #[error("Request to {url} failed: {reason}")]
    TransportFailure { url: String, reason: String },

    /// The call was cancelled by the user
    #[error("Request to {url} was cancelled")]
    TransportCancelled { url: String },

    /// The collection pre-request failed or was cancelled
    #[error("Pre-request failed: {reason}")]
    PreRequestFailure { reason: String },

    /// A capture rule found nothing to capture
    #[error("Nothing to capture from {origin} at '{path}'")]
    CaptureFailure { origin: CaptureSource, path: String },

    /// The isolated script context could not be set up
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a script failure
    pub fn script_failure(stage: ScriptStage, message: impl Into<String>) -> Self {
        Error::ScriptFailure {
            stage,
            message: message.into(),
        }
    }

    /// Create a script timeout
    pub fn script_timeout(stage: ScriptStage, timeout_ms: u64) -> Self {
        Error::ScriptTimeout { stage, timeout_ms }
    }

    /// Create a transport failure
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::TransportFailure {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(url: impl Into<String>) -> Self {
        Error::TransportCancelled { url: url.into() }
    }

    /// Create a pre-request failure
    pub fn pre_request(reason: impl Into<String>) -> Self {
        Error::PreRequestFailure {
            reason: reason.into(),
        }
    }

    /// Create a sandbox error
    pub fn sandbox<S: Into<String>>(msg: S) -> Self {
        Error::Sandbox(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a script timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ScriptTimeout { .. })
    }

    /// Check if this is a user cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::TransportCancelled { .. })
    }

    /// Check if this error comes from a script
    pub fn is_script(&self) -> bool {
        matches!(self, Error::ScriptFailure { .. } | Error::ScriptTimeout { .. })
    }

    /// Whether this error stops the remaining pipeline stages.
    ///
    /// Capture failures are the only ones a run continues past.
    pub fn aborts_run(&self) -> bool {
        !matches!(self, Error::CaptureFailure { .. })
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::TransportFailure { url, .. } => Some(url),
            Error::TransportCancelled { url } => Some(url),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add operation context to error
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            Error::Other(format!("{}: {}", msg, err))
        })
    }
}
