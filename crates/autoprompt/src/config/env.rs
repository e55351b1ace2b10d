//! Environment-based configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "AUTOPROMPT";

/// Environment variable reader.
///
/// Values set with [`with_value`](Self::with_value) take precedence over the
/// process environment, which lets tests exercise overrides without touching
/// global state.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    overrides: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a reader for `<prefix>_<NAME>` variables.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    /// Pin `name` to `value` regardless of the process environment.
    #[must_use]
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.overrides.insert(self.var_name(name), value.into());
        self
    }

    /// The full variable name for `name`.
    #[must_use]
    pub fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        self.overrides
            .get(&var_name)
            .cloned()
            .or_else(|| std::env::var(&var_name).ok())
    }

    /// Get a parsed value. Unparsable values are logged and ignored.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.get(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(var = %self.var_name(name), value = %raw, "ignoring unparsable environment override");
                None
            }
        }
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get a duration in milliseconds.
    #[must_use]
    pub fn duration_millis(&self, name: &str) -> Option<Duration> {
        self.parse::<u64>(name).map(Duration::from_millis)
    }
}

/// Recognised variable names, without the prefix.
pub mod vars {
    /// Program to run.
    pub const SHELL: &str = "SHELL";
    /// Reader poll interval in milliseconds.
    pub const POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
    /// Reap timeout in milliseconds.
    pub const EXIT_WAIT_MS: &str = "EXIT_WAIT_MS";
    /// Automation look-behind window in bytes.
    pub const LOOKBEHIND: &str = "LOOKBEHIND";
    /// Log filter directive.
    pub const LOG: &str = "LOG";
    /// Emit JSON log lines.
    pub const LOG_JSON: &str = "LOG_JSON";
}
