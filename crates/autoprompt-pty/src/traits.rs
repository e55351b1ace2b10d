//! Core traits shared by every spawn strategy.
//!
//! - [`PtyChild`]: lifecycle handle for the spawned process.
//! - [`Resize`]: terminal geometry control, present only on backends that
//!   have a real terminal behind them.

use std::future::Future;
use std::pin::Pin;

use crate::config::WindowSize;
use crate::error::Result;

/// Handle for a spawned child process.
///
/// Kept separate from the byte streams so the reader, the writer and the
/// lifecycle owner can each hold their own part of a channel.
pub trait PtyChild: Send + Sync {
    /// Get the process ID of the child.
    fn pid(&self) -> Option<u32>;

    /// Wait for the child process to exit and reap it.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ExitStatus>> + Send + '_>>;

    /// Try to get the exit status without blocking.
    ///
    /// Returns `None` if the process is still running.
    fn try_wait(&mut self) -> Result<Option<ExitStatus>>;

    /// Forcibly terminate the child and anything it started.
    ///
    /// Killing a child that has already been reaped is not an error.
    fn kill(&mut self) -> Result<()>;

    /// The process group the child leads, if [`kill`](Self::kill) signals a
    /// whole group.
    fn process_group(&self) -> Option<u32> {
        None
    }
}

/// Terminal resize capability.
pub trait Resize: Send + Sync {
    /// Apply a new geometry to the terminal.
    fn resize(&self, size: WindowSize) -> Result<()>;
}

/// Exit status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited normally with the given exit code.
    Exited(i32),

    /// The process was terminated by a signal (Unix only).
    #[cfg(unix)]
    Signaled(i32),
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code, if the process exited on its own.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            #[cfg(unix)]
            Self::Signaled(_) => None,
        }
    }

    /// Get the signal number that terminated the process (Unix only).
    #[cfg(unix)]
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(*sig),
            Self::Exited(_) => None,
        }
    }

    /// Collapse the status into a single shell-style exit code.
    ///
    /// Signal deaths map to `128 + signal`, the way POSIX shells report them.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            #[cfg(unix)]
            Self::Signaled(sig) => 128 + *sig,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(code) = status.code() {
                Self::Exited(code)
            } else if let Some(signal) = status.signal() {
                Self::Signaled(signal)
            } else {
                Self::Exited(-1)
            }
        }

        #[cfg(not(unix))]
        {
            Self::Exited(status.code().unwrap_or(-1))
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            #[cfg(unix)]
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}
