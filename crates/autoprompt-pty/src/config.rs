//! Spawn settings shared by every strategy.
//!
//! A strategy ignores settings it cannot honour. The pipe fallback has no
//! terminal, so it drops the window size.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{PtyError, Result};

/// What a strategy needs to know to start the child.
///
/// ```
/// use autoprompt_pty::PtyConfig;
///
/// let config = PtyConfig::builder()
///     .working_directory("/tmp")
///     .env("TERM", "xterm-256color")
///     .window_size(120, 40)
///     .build();
/// assert_eq!(config.window_size.cols, 120);
/// ```
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Directory the child starts in. `None` keeps the caller's.
    pub working_directory: Option<PathBuf>,

    /// Variables set on top of the inherited environment.
    pub env: HashMap<OsString, OsString>,

    /// Geometry of the terminal at spawn time.
    pub window_size: WindowSize,

    /// Unix: put the child in its own session with the PTY as its
    /// controlling terminal, so job control and `SIGWINCH` work.
    pub new_session: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            env: HashMap::new(),
            window_size: WindowSize::default(),
            new_session: true,
        }
    }
}

impl PtyConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::default()
    }

    /// The parent's environment with [`env`](Self::env) applied.
    #[must_use]
    pub fn child_env(&self) -> HashMap<OsString, OsString> {
        let mut vars: HashMap<_, _> = std::env::vars_os().collect();
        vars.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    config: PtyConfig,
}

impl PtyConfigBuilder {
    /// Start the child in `path`.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Set one variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Terminal geometry at spawn time.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.config.window_size = WindowSize::new(cols, rows);
        self
    }

    /// See [`PtyConfig::new_session`].
    #[must_use]
    pub const fn new_session(mut self, value: bool) -> Self {
        self.config.new_session = value;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.config
    }
}

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Columns.
    pub cols: u16,
    /// Rows.
    pub rows: u16,
}

impl WindowSize {
    /// A geometry of `cols` by `rows`. Not validated.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// A geometry of `cols` by `rows`, rejecting zero in either dimension.
    pub fn checked(cols: u16, rows: u16) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(PtyError::InvalidWindowSize { cols, rows });
        }
        Ok(Self::new(cols, rows))
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl From<(u16, u16)> for WindowSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self::new(cols, rows)
    }
}
