//! autoprompt: drive an interactive child through a PTY and answer its prompts
//!
//! This crate runs a program behind a pseudo-terminal (falling back to plain
//! pipes when no terminal can be created), streams its output as events, and
//! injects configured responses when that output matches a rule.
//!
//! # Components
//!
//! - [`Session`]: lifecycle state machine around one child, with a reader
//!   worker that publishes [`SessionEvent`]s
//! - [`AutomationEngine`]: ordered, first-match-wins [`AutomationRule`]s
//! - [`Router`]: decodes output, feeds a [`ScreenSink`] and writes rule
//!   responses back to the session
//! - [`config::AppConfig`]: JSON/TOML configuration with `AUTOPROMPT_*`
//!   environment overrides
//!
//! # Example
//!
//! ```no_run
//! use autoprompt::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = AutomationEngine::new(vec![
//!         rule!("login:", "bob\r\n"),
//!         rule!("Password:", "secret\r\n", delay_ms = 200),
//!     ]);
//!     let mut router = Router::new(Session::new(SessionConfig::default()), engine, Transcript::new())?;
//!
//!     router.start("telnet", ["localhost"]).await?;
//!     let state = router.run().await;
//!     println!("session {state}");
//!     Ok(())
//! }
//! ```

// Re-export macros
pub use autoprompt_macros::rule;

/// The channel layer this crate is built on.
pub use autoprompt_pty as pty;

pub mod automation;
pub mod config;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod routing;
pub mod session;

pub use autoprompt_pty::{BackendKind, BackendSelector, ResizeOutcome, WindowSize};
pub use automation::{AutomationEngine, AutomationRule, Firing, RuleBuilder};
pub use config::{AppConfig, LogFormat, LoggingConfig, RuleConfig};
pub use encoding::{EncodedText, Utf8Decoder, decode_utf8_lossy};
pub use error::{
    BackendAttempt, BackendUnavailable, ConfigError, LoggingError, PtyError, RouterError,
    RuleError, SessionError, SpawnError,
};
pub use routing::{Command, NullScreen, Router, RouterHandle, ScreenSink, Transcript, WriterScreen};
pub use session::{Session, SessionConfig, SessionEvent, SessionState, Spawned};
