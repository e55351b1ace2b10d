//! Spawn strategies and ordered backend selection.
//!
//! A [`BackendSelector`] holds an ordered list of [`SpawnStrategy`]
//! implementations. [`BackendSelector::spawn`] tries each in turn and returns
//! the first channel that comes up, together with the reasons every earlier
//! strategy was skipped. When all of them fail the caller gets a
//! [`BackendUnavailable`] listing each attempt.

use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::pin::Pin;

use crate::channel::Channel;
use crate::config::PtyConfig;
use crate::error::{BackendAttempt, BackendUnavailable, Result};

/// Identifies which spawn strategy produced a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The platform's pseudo-terminal (Unix PTY or Windows `ConPTY`).
    NativePty,
    /// Plain pipes for stdin and stdout/stderr.
    Pipe,
}

impl BackendKind {
    /// Short name used in logs and error reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            #[cfg(windows)]
            Self::NativePty => "conpty",
            #[cfg(not(windows))]
            Self::NativePty => "pty",
            Self::Pipe => "pipe",
        }
    }

    /// Whether channels of this kind can change terminal geometry.
    #[must_use]
    pub const fn supports_resize(self) -> bool {
        matches!(self, Self::NativePty)
    }

    /// Behavioural differences from a real terminal, if any.
    #[must_use]
    pub const fn limitations(self) -> &'static [&'static str] {
        match self {
            Self::NativePty => &[],
            Self::Pipe => &[
                "resize requests are ignored",
                "the child sees no terminal, so input is not echoed",
                "the child may block-buffer its output",
                "stdout and stderr are merged into one stream",
            ],
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Boxed future returned by [`SpawnStrategy::spawn`].
pub type SpawnFuture<'a> = Pin<Box<dyn Future<Output = Result<Channel>> + Send + 'a>>;

/// One way of starting a child behind a [`Channel`].
pub trait SpawnStrategy: Send + Sync {
    /// Which backend this strategy produces.
    fn kind(&self) -> BackendKind;

    /// Spawn `program` with `args`.
    fn spawn<'a>(
        &'a self,
        program: &'a OsStr,
        args: &'a [OsString],
        config: &'a PtyConfig,
    ) -> SpawnFuture<'a>;
}

/// The platform pseudo-terminal strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePty;

impl SpawnStrategy for NativePty {
    fn kind(&self) -> BackendKind {
        BackendKind::NativePty
    }

    fn spawn<'a>(
        &'a self,
        program: &'a OsStr,
        args: &'a [OsString],
        config: &'a PtyConfig,
    ) -> SpawnFuture<'a> {
        Box::pin(async move {
            #[cfg(unix)]
            {
                crate::unix::spawn(program, args, config)
            }
            #[cfg(windows)]
            {
                crate::windows::spawn(program, args, config)
            }
            #[cfg(not(any(unix, windows)))]
            {
                let _ = (program, args, config);
                Err(crate::error::PtyError::Unsupported("native PTY"))
            }
        })
    }
}

/// The pipe-based fallback strategy.
///
/// See [`BackendKind::limitations`] for how it differs from a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeFallback;

impl SpawnStrategy for PipeFallback {
    fn kind(&self) -> BackendKind {
        BackendKind::Pipe
    }

    fn spawn<'a>(
        &'a self,
        program: &'a OsStr,
        args: &'a [OsString],
        config: &'a PtyConfig,
    ) -> SpawnFuture<'a> {
        Box::pin(async move { crate::pipe::spawn(program, args, config) })
    }
}

/// A channel plus the strategies that were skipped to get it.
#[derive(Debug)]
pub struct Selection {
    /// The live channel.
    pub channel: Channel,
    /// Failed attempts before the winning strategy, in order.
    pub skipped: Vec<BackendAttempt>,
}

/// Tries spawn strategies in a fixed priority order.
pub struct BackendSelector {
    strategies: Vec<Box<dyn SpawnStrategy>>,
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.kind()))
            .finish()
    }
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendSelector {
    /// Native pseudo-terminal first, then the pipe fallback.
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategies(vec![Box::new(NativePty), Box::new(PipeFallback)])
    }

    /// Use a custom strategy list, tried in the given order.
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn SpawnStrategy>>) -> Self {
        Self { strategies }
    }

    /// Only the pipe fallback.
    #[must_use]
    pub fn pipe_only() -> Self {
        Self::with_strategies(vec![Box::new(PipeFallback)])
    }

    /// The configured order.
    #[must_use]
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Spawn with the first strategy that succeeds.
    pub async fn spawn(
        &self,
        program: &OsStr,
        args: &[OsString],
        config: &PtyConfig,
    ) -> std::result::Result<Selection, BackendUnavailable> {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            match strategy.spawn(program, args, config).await {
                Ok(channel) => {
                    tracing::debug!(
                        backend = kind.name(),
                        pid = ?channel.pid(),
                        program = %program.to_string_lossy(),
                        "spawned child"
                    );
                    return Ok(Selection {
                        channel,
                        skipped: attempts,
                    });
                }
                Err(e) => {
                    tracing::debug!(backend = kind.name(), error = %e, "spawn strategy failed");
                    attempts.push(BackendAttempt::new(kind, &e));
                }
            }
        }

        Err(BackendUnavailable {
            command: program.to_string_lossy().into_owned(),
            attempts,
        })
    }
}
