//! Error types for the autoprompt-pty crate.
//!
//! [`PtyError`] covers failures of a single channel or spawn strategy.
//! [`BackendUnavailable`] is what the [`BackendSelector`](crate::BackendSelector)
//! reports once every strategy has been tried and none produced a channel.

use std::fmt;
use std::io;

use crate::backend::BackendKind;

/// The error type for channel and spawn operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to allocate a pseudo-terminal.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// Failed to spawn the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error occurred on the channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to resize the terminal.
    #[error("failed to resize PTY: {0}")]
    Resize(#[source] io::Error),

    /// The channel has been closed.
    #[error("channel has been closed")]
    Closed,

    /// Failed to deliver a signal to the child.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// Failed to reap the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),

    /// A zero-sized window was requested.
    #[error("invalid window size: {cols}x{rows}")]
    InvalidWindowSize {
        /// The requested column count.
        cols: u16,
        /// The requested row count.
        rows: u16,
    },

    /// This strategy cannot run on the current platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    /// Platform-specific error on Windows.
    #[cfg(windows)]
    #[error("Windows error: {message} (code: {code})")]
    Windows {
        /// Description of the error.
        message: String,
        /// The Windows error code.
        code: u32,
    },

    /// `ConPTY` is not available (Windows older than 10 1809).
    #[cfg(windows)]
    #[error("ConPTY is not available on this Windows version")]
    ConPtyNotAvailable,
}

/// A specialized Result type for channel operations.
pub type Result<T> = std::result::Result<T, PtyError>;

#[cfg(unix)]
impl From<rustix::io::Errno> for PtyError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(io::Error::from_raw_os_error(errno.raw_os_error()))
    }
}

/// One failed spawn attempt recorded by the backend selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAttempt {
    /// The strategy that was tried.
    pub backend: BackendKind,
    /// Why it failed.
    pub reason: String,
}

impl BackendAttempt {
    /// Record a failed attempt from the strategy's error.
    #[must_use]
    pub fn new(backend: BackendKind, error: &PtyError) -> Self {
        Self {
            backend,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for BackendAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend.name(), self.reason)
    }
}

/// Every spawn strategy failed.
///
/// The attempts are kept in the order they were tried so a caller can show
/// exactly why each backend was rejected.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no backend could spawn `{command}`{}", format_attempts(.attempts))]
pub struct BackendUnavailable {
    /// The command that could not be started.
    pub command: String,
    /// Each strategy tried, with its failure reason.
    pub attempts: Vec<BackendAttempt>,
}

fn format_attempts(attempts: &[BackendAttempt]) -> String {
    if attempts.is_empty() {
        return " (no strategies configured)".to_string();
    }
    attempts
        .iter()
        .map(|attempt| format!("\n  - {attempt}"))
        .collect()
}
