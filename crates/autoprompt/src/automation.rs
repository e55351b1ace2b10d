//! Pattern-triggered auto-responses.
//!
//! An [`AutomationEngine`] holds [`AutomationRule`]s in priority order. Each
//! chunk of decoded output is offered to [`AutomationEngine::evaluate`], which
//! returns the response of the first eligible rule whose regex occurs in the
//! chunk and marks that rule fired. At most one rule fires per chunk.
//!
//! ```
//! use autoprompt::{AutomationEngine, AutomationRule};
//!
//! let mut engine = AutomationEngine::new(vec![
//!     AutomationRule::builder("login:", "bob\r\n").build()?,
//!     AutomationRule::builder("Password:", "secret\r\n").build()?,
//! ]);
//!
//! assert_eq!(engine.evaluate("login: ").unwrap().response, "bob\r\n");
//! assert!(engine.evaluate("login: ").is_none());
//! assert_eq!(engine.evaluate("Password: ").unwrap().response, "secret\r\n");
//! # Ok::<(), autoprompt::RuleError>(())
//! ```
//!
//! Matching is per chunk by default, so a prompt split across two reads is
//! missed. [`AutomationEngine::with_lookbehind`] keeps a bounded tail of
//! earlier output to cover that case.

mod engine;
mod rule;
mod window;

pub use engine::{AutomationEngine, Firing};
pub use rule::{AutomationRule, RuleBuilder};
