//! Error types for autoprompt.
//!
//! Spawn failures are returned from [`Session::start`](crate::Session::start).
//! Failures after a session is running are not returned as errors to the
//! caller of the reader loop; they arrive as [`SessionEvent`](crate::SessionEvent)s.

use std::path::PathBuf;

use thiserror::Error;

pub use autoprompt_pty::{BackendAttempt, BackendUnavailable, PtyError};

use crate::session::SessionState;

/// A session could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// `start` was called on a session that is not idle.
    #[error("session already started (state: {state})")]
    AlreadyStarted {
        /// The state the session was in.
        state: SessionState,
    },

    /// The command or an argument cannot be passed to a process.
    #[error("invalid {kind}: {reason}")]
    InvalidArgument {
        /// Which input was rejected ("command" or "argument").
        kind: &'static str,
        /// The rejected value, lossily converted for display.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No spawn strategy could start the command.
    #[error(transparent)]
    BackendUnavailable(#[from] BackendUnavailable),
}

impl SpawnError {
    /// Create an invalid-argument error.
    pub fn invalid_argument(kind: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidArgument {
            kind,
            value: value.into(),
            reason,
        }
    }
}

/// A write, resize or stop request could not be carried out.
///
/// The same failure is also published as
/// [`SessionEvent::Error`](crate::SessionEvent::Error).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is not in the `Running` state.
    #[error("session is not running (state: {state})")]
    NotRunning {
        /// The state the session was in.
        state: SessionState,
    },

    /// The channel rejected the operation.
    #[error(transparent)]
    Channel(#[from] PtyError),
}

/// An automation rule could not be built.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    /// The pattern is not a valid regular expression.
    #[error("invalid pattern for rule {rule}: {source}")]
    InvalidPattern {
        /// Rule name, or the pattern itself for unnamed rules.
        rule: String,
        /// The regex compiler's complaint.
        #[source]
        source: regex::Error,
    },
}

/// A configuration file could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The extension does not name a supported format.
    #[error("unsupported config format for {} (expected .json or .toml)", path.display())]
    UnknownFormat {
        /// The offending path.
        path: PathBuf,
    },

    /// The JSON document is malformed or has the wrong shape.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML document is malformed or has the wrong shape.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configured rule is invalid.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// The logging subscriber could not be installed.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured filter directive does not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber was already set.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// The router could not be assembled.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The session's event receiver was already taken.
    #[error("session events were already taken by another consumer")]
    EventsTaken,

    /// The router behind a handle has been dropped.
    #[error("router is no longer running")]
    Closed,
}
