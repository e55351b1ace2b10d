//! Convenient re-exports for common autoprompt usage.
//!
//! ```
//! use autoprompt::prelude::*;
//!
//! let mut engine = AutomationEngine::new(vec![rule!("continue\\?", "y\n", once = false)]);
//! assert!(engine.evaluate("Continue? [y/n]").is_some());
//! assert!(engine.evaluate("Continue? [y/n]").is_some());
//! ```

pub use crate::rule;

// Session
pub use crate::session::{Session, SessionConfig, SessionEvent, SessionState, Spawned};

// Automation
pub use crate::automation::{AutomationEngine, AutomationRule, Firing};

// Routing
pub use crate::routing::{NullScreen, Router, RouterHandle, ScreenSink, Transcript};

// Configuration
pub use crate::config::{AppConfig, LoggingConfig, RuleConfig};

// Errors
pub use crate::error::{ConfigError, RuleError, SessionError, SpawnError};

// Channel layer
pub use autoprompt_pty::{BackendKind, ResizeOutcome, WindowSize};
