//! autoprompt-macros: Procedural macros for autoprompt
//!
//! - [`rule!`] - Build an `AutomationRule` whose pattern is checked at
//!   compile time
//!
//! # Example
//!
//! ```ignore
//! use autoprompt::{AutomationEngine, rule};
//!
//! let engine = AutomationEngine::new(vec![
//!     rule!("login:", "admin\r\n", name = "login"),
//!     rule!(r"[Pp]assword:", "secret\r\n", case_sensitive = true, delay_ms = 150),
//!     rule!(r"\(y/n\)", "y\n", once = false),
//! ]);
//! ```

// In proc-macro crates, passing parsed input by value is idiomatic
#![allow(clippy::needless_pass_by_value)]

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod rule;

/// Build an `autoprompt::AutomationRule` with a compile-time validated pattern.
///
/// # Syntax
///
/// ```ignore
/// rule!("pattern", "response")
/// rule!("pattern", b"\x03", once = false)
/// rule!("pattern", "response", name = "n", case_sensitive = true, delay_ms = 250, active = false)
/// ```
///
/// Options are `name` (string), `once`, `case_sensitive`, `active` (bool)
/// and `delay_ms` (integer). Unset options keep the builder defaults. An
/// invalid regex is a compile error pointing at the pattern.
#[proc_macro]
pub fn rule(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as rule::RuleInput);
    rule::expand(input).into()
}
