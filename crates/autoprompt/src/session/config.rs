//! Session configuration.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use autoprompt_pty::{PtyConfig, WindowSize};

/// Default wait for one read before the worker re-checks for shutdown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default wait for the child to be reaped.
pub const DEFAULT_EXIT_WAIT: Duration = Duration::from_secs(2);

/// How a [`Session`](crate::Session) spawns and polls its child.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on one read; also bounds how long `stop` waits for the
    /// worker to notice.
    pub poll_interval: Duration,

    /// How long to wait for the child to be reaped after EOF or a kill.
    pub exit_wait: Duration,

    /// Terminal geometry at spawn.
    pub window_size: WindowSize,

    /// Working directory for the child.
    pub working_directory: Option<PathBuf>,

    /// Variables added to the inherited environment.
    pub env: HashMap<OsString, OsString>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            exit_wait: DEFAULT_EXIT_WAIT,
            window_size: WindowSize::default(),
            working_directory: None,
            env: HashMap::new(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the reap timeout.
    #[must_use]
    pub const fn exit_wait(mut self, wait: Duration) -> Self {
        self.exit_wait = wait;
        self
    }

    /// Set the initial terminal geometry.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.window_size = WindowSize::new(cols, rows);
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(path.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub(crate) fn pty_config(&self) -> PtyConfig {
        let mut builder = PtyConfig::builder().window_size(self.window_size.cols, self.window_size.rows);
        if let Some(dir) = &self.working_directory {
            builder = builder.working_directory(dir);
        }
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }
        builder.build()
    }
}
