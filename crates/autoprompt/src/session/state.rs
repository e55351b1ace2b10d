//! Session lifecycle states.

use std::fmt;

/// Where a [`Session`](crate::Session) is in its lifecycle.
///
/// `Idle → Starting → Running → Exited | Failed`. A spawn failure goes
/// straight from `Starting` to `Failed`. `Exited` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, not started.
    #[default]
    Idle,
    /// A backend is being selected.
    Starting,
    /// The child is running and the reader worker is active.
    Running,
    /// The child exited with this code. Signal deaths map to `128 + signal`.
    Exited(i32),
    /// The session ended abnormally.
    Failed(String),
}

impl SessionState {
    /// Whether the session accepts writes.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the session has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Failed(_))
    }

    /// The exit code, if the child exited.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Starting => f.write_str("starting"),
            Self::Running => f.write_str("running"),
            Self::Exited(code) => write!(f, "exited ({code})"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
