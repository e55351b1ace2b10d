//! Events published by a running session.

use bytes::Bytes;

/// Something that happened in a session.
///
/// Output arrives in the order the child produced it. Exactly one of
/// `Exited` or `Failed` ends a session that reached `Running`, and no
/// `Output` follows it. `Error` reports a recoverable write or resize
/// failure and may appear at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A non-empty chunk of raw output.
    Output(Bytes),
    /// The child exited with this code.
    Exited(i32),
    /// The session ended abnormally.
    Failed(String),
    /// A command failed; the session keeps running.
    Error(String),
}

impl SessionEvent {
    /// Whether this event ends the session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Failed(_))
    }

    /// The output payload, if this is an output event.
    #[must_use]
    pub const fn output(&self) -> Option<&Bytes> {
        match self {
            Self::Output(bytes) => Some(bytes),
            _ => None,
        }
    }
}
