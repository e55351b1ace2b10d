//! Tests for loading configuration files and environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use autoprompt::config::{self, ConfigFormat, EnvConfig};
use autoprompt::{AppConfig, ConfigError, LogFormat, WindowSize};

/// A file in the temp directory, removed on drop.
struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str, contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("autoprompt-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        Self(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

const JSON: &str = r#"{
    "shell": "/bin/bash",
    "shellArgs": ["-l"],
    "automationRules": [
        { "name": "user", "pattern": "login:", "response": "bob\n" },
        { "pattern": "(?i)continue", "response": "y\n", "once": false, "delayMs": 50 },
        { "pattern": "danger", "response": "n\n", "is_active": false }
    ],
    "sidebar_buttons": [{ "label": "ignored" }]
}"#;

const TOML: &str = r#"
shell = "/bin/zsh"

[session]
poll_interval_ms = 25
cols = 132
rows = 43

[automation]
lookbehind = 256

[logging]
level = "debug"
format = "json"

[[automation_rules]]
pattern = "Password:"
response = "secret\n"
case_sensitive = true
"#;

/// A JSON file in the desktop layout loads, ignoring unknown keys.
#[test]
fn load_json_file() {
    let file = TempFile::new("rules.json", JSON);
    let config = AppConfig::load(&file.0).unwrap();

    assert_eq!(config.command(), "/bin/bash");
    assert_eq!(config.shell_args, vec!["-l"]);
    assert_eq!(config.automation_rules.len(), 3);

    let continue_rule = &config.automation_rules[1];
    assert!(!continue_rule.once);
    assert_eq!(continue_rule.delay_ms, 50);
    assert!(!config.automation_rules[2].active);

    let engine = config.automation_engine().unwrap();
    assert_eq!(engine.len(), 3);
    assert_eq!(engine.rules()[0].name(), Some("user"));
    assert_eq!(engine.rules()[1].delay(), Duration::from_millis(50));
    assert_eq!(engine.lookbehind(), 0);
}

/// A TOML file sets session, automation and logging sections.
#[test]
fn load_toml_file() {
    let file = TempFile::new("autoprompt.toml", TOML);
    let config = AppConfig::load(&file.0).unwrap();

    assert_eq!(config.command(), "/bin/zsh");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);

    let session = config.session_config();
    assert_eq!(session.poll_interval, Duration::from_millis(25));
    assert_eq!(session.window_size, WindowSize::new(132, 43));

    let engine = config.automation_engine().unwrap();
    assert_eq!(engine.lookbehind(), 256);
    assert!(engine.rules()[0].case_sensitive());
}

/// Files with other extensions are rejected before reading.
#[test]
fn unknown_extension() {
    let err = AppConfig::load("/nonexistent/autoprompt.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::UnknownFormat { .. }));
    assert_eq!(ConfigFormat::from_path("a.JSON".as_ref()), Some(ConfigFormat::Json));
}

/// A missing file reports its path.
#[test]
fn missing_file() {
    let err = AppConfig::load("/nonexistent/autoprompt.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("/nonexistent/autoprompt.toml"));
}

/// A rule without a pattern is a parse error.
#[test]
fn rule_requires_pattern() {
    let err = AppConfig::from_json_str(r#"{ "automationRules": [{ "response": "x" }] }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

/// An invalid rule pattern surfaces when the engine is built.
#[test]
fn invalid_pattern_in_file() {
    let config = AppConfig::from_json_str(r#"{ "automationRules": [{ "pattern": "(" }] }"#).unwrap();
    assert!(config.automation_engine().is_err());
}

/// Environment overrides replace file values.
#[test]
fn env_overrides() {
    let file = TempFile::new("env.toml", TOML);
    let env = EnvConfig::new("APTEST")
        .with_value("SHELL", "/bin/dash")
        .with_value("EXIT_WAIT_MS", "750")
        .with_value("LOOKBEHIND", "not-a-number")
        .with_value("LOG_JSON", "false");

    let config = AppConfig::load(&file.0).unwrap().apply_env_from(&env);
    assert_eq!(config.command(), "/bin/dash");
    assert_eq!(config.session_config().exit_wait, Duration::from_millis(750));
    assert_eq!(config.automation.lookbehind, 256);
    assert_eq!(config.logging.format, LogFormat::Text);
}

/// The fallback shell is never empty.
#[test]
fn default_shell_is_set() {
    assert!(!config::default_shell().is_empty());
    assert_eq!(AppConfig::default().command(), config::default_shell());
}
