//! Configuration types for autoprompt.
//!
//! [`AppConfig`] is the top-level document. It is usually read from a JSON or
//! TOML file with [`AppConfig::load`] and then adjusted from `AUTOPROMPT_*`
//! environment variables with [`AppConfig::apply_env`]. Unknown keys are
//! ignored, so a config file shared with a front end may carry extra
//! sections.
//!
//! ```
//! use autoprompt::config::AppConfig;
//!
//! let config = AppConfig::from_json_str(r#"{
//!     "shell": "bash",
//!     "automation_rules": [
//!         { "name": "login", "pattern": "login:", "response": "bob\r\n" },
//!         { "pattern": "Password:", "response": "secret\r\n", "delayMs": 250 }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(config.automation_rules.len(), 2);
//! let engine = config.automation_engine().unwrap();
//! assert_eq!(engine.rules().len(), 2);
//! ```

pub mod env;
pub mod file;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use env::EnvConfig;
pub use file::ConfigFormat;

use crate::automation::{AutomationEngine, AutomationRule};
use crate::error::{ConfigError, RuleError};
use crate::session::SessionConfig;
use autoprompt_pty::WindowSize;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Program to run. Falls back to [`default_shell`].
    pub shell: Option<String>,

    /// Arguments passed to the program.
    #[serde(alias = "shellArgs")]
    pub shell_args: Vec<String>,

    /// Automation rules in priority order.
    #[serde(alias = "automationRules")]
    pub automation_rules: Vec<RuleConfig>,

    /// Session timing and geometry.
    pub session: SessionSettings,

    /// Automation engine settings.
    pub automation: AutomationSettings,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load a configuration file, choosing the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        file::load(path.as_ref())
    }

    /// Parse a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `AUTOPROMPT_*` overrides from the process environment.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_env_from(&EnvConfig::default())
    }

    /// Apply overrides from the given environment reader.
    #[must_use]
    pub fn apply_env_from(mut self, env: &EnvConfig) -> Self {
        if let Some(shell) = env.get(env::vars::SHELL).filter(|s| !s.is_empty()) {
            self.shell = Some(shell);
        }
        if let Some(ms) = env.parse::<u64>(env::vars::POLL_INTERVAL_MS) {
            self.session.poll_interval_ms = ms;
        }
        if let Some(ms) = env.parse::<u64>(env::vars::EXIT_WAIT_MS) {
            self.session.exit_wait_ms = ms;
        }
        if let Some(bytes) = env.parse::<usize>(env::vars::LOOKBEHIND) {
            self.automation.lookbehind = bytes;
        }
        if let Some(level) = env.get(env::vars::LOG) {
            self.logging.level = level;
        }
        if let Some(json) = env.bool(env::vars::LOG_JSON) {
            self.logging.format = if json { LogFormat::Json } else { LogFormat::Text };
        }
        self
    }

    /// The program to run: the configured shell or the platform default.
    #[must_use]
    pub fn command(&self) -> String {
        self.shell
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_shell)
    }

    /// Build the automation engine described by this configuration.
    pub fn automation_engine(&self) -> Result<AutomationEngine, RuleError> {
        let engine = AutomationEngine::from_configs(&self.automation_rules)?;
        Ok(engine.with_lookbehind(self.automation.lookbehind))
    }

    /// Build the session configuration described by this configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        self.session.to_session_config()
    }
}

/// Session timing and geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// How long one read waits before the worker re-checks for shutdown.
    pub poll_interval_ms: u64,

    /// How long to wait for the child to be reaped after EOF or a kill.
    pub exit_wait_ms: u64,

    /// Initial terminal width.
    pub cols: u16,

    /// Initial terminal height.
    pub rows: u16,

    /// Working directory for the child.
    pub working_directory: Option<PathBuf>,

    /// Extra environment variables for the child.
    pub env: HashMap<String, String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            poll_interval_ms: millis(defaults.poll_interval),
            exit_wait_ms: millis(defaults.exit_wait),
            cols: defaults.window_size.cols,
            rows: defaults.window_size.rows,
            working_directory: None,
            env: HashMap::new(),
        }
    }
}

impl SessionSettings {
    /// Convert to a [`SessionConfig`]. Zero dimensions fall back to 80x24.
    #[must_use]
    pub fn to_session_config(&self) -> SessionConfig {
        let window_size =
            WindowSize::checked(self.cols, self.rows).unwrap_or_else(|_| WindowSize::default());
        let mut config = SessionConfig::new()
            .poll_interval(Duration::from_millis(self.poll_interval_ms.max(1)))
            .exit_wait(Duration::from_millis(self.exit_wait_ms))
            .window_size(window_size.cols, window_size.rows);
        if let Some(dir) = &self.working_directory {
            config = config.working_directory(dir);
        }
        for (key, value) in &self.env {
            config = config.env(key, value);
        }
        config
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Automation engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    /// Bytes of earlier output kept for matching across chunk boundaries.
    /// Zero matches each chunk on its own.
    pub lookbehind: usize,
}

/// One configured automation rule.
///
/// Keys are camelCase; the snake-case spellings `case_sensitive`, `delay_ms`
/// and `is_active` are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    /// Optional rule name, used in logs and by `set_active`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Regular expression searched for in each chunk.
    pub pattern: String,

    /// Text written to the session when the rule fires.
    #[serde(default)]
    pub response: String,

    /// Fire at most once.
    #[serde(default = "default_true")]
    pub once: bool,

    /// Match case-sensitively.
    #[serde(default, alias = "case_sensitive")]
    pub case_sensitive: bool,

    /// Delay before the response is written, in milliseconds.
    #[serde(default, alias = "delay_ms")]
    pub delay_ms: u64,

    /// Whether the rule participates in matching.
    #[serde(default = "default_true", alias = "is_active")]
    pub active: bool,
}

const fn default_true() -> bool {
    true
}

impl RuleConfig {
    /// A rule with default flags.
    #[must_use]
    pub fn new(pattern: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: None,
            pattern: pattern.into(),
            response: response.into(),
            once: true,
            case_sensitive: false,
            delay_ms: 0,
            active: true,
        }
    }

    /// Compile into an [`AutomationRule`].
    pub fn build(&self) -> Result<AutomationRule, RuleError> {
        let mut builder = AutomationRule::builder(&self.pattern, self.response.clone())
            .once(self.once)
            .case_sensitive(self.case_sensitive)
            .delay(Duration::from_millis(self.delay_ms))
            .active(self.active);
        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        builder.build()
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `autoprompt=debug`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Include the event target (module path) in each line.
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter directive.
    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the output format.
    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// Newline-delimited JSON.
    Json,
}

/// The shell used when none is configured.
///
/// `$SHELL` if set, otherwise `/bin/sh`; `powershell.exe` on Windows.
#[must_use]
pub fn default_shell() -> String {
    if cfg!(windows) {
        return "powershell.exe".to_string();
    }
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}
