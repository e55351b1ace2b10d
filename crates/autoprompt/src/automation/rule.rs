//! A single automation rule and its builder.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use regex::{Regex, RegexBuilder};

use crate::error::RuleError;

/// A pattern that, when seen in output, triggers a canned response.
///
/// Rules are case-insensitive, active and fire once unless configured
/// otherwise. The `fired` flag is owned by the rule and only ever goes from
/// false to true.
#[derive(Clone)]
pub struct AutomationRule {
    name: Option<String>,
    regex: Regex,
    response: Bytes,
    once: bool,
    case_sensitive: bool,
    delay: Duration,
    active: bool,
    fired: bool,
}

impl fmt::Debug for AutomationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationRule")
            .field("name", &self.name)
            .field("pattern", &self.regex.as_str())
            .field("response", &self.response)
            .field("once", &self.once)
            .field("case_sensitive", &self.case_sensitive)
            .field("delay", &self.delay)
            .field("active", &self.active)
            .field("fired", &self.fired)
            .finish()
    }
}

impl AutomationRule {
    /// Start building a rule that answers `pattern` with `response`.
    #[must_use]
    pub fn builder(pattern: impl Into<String>, response: impl Into<Bytes>) -> RuleBuilder {
        RuleBuilder::new(pattern, response)
    }

    /// The rule's name, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for logs: the rule name, or its pattern when unnamed.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.regex.as_str())
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Bytes written when the rule fires.
    #[must_use]
    pub const fn response(&self) -> &Bytes {
        &self.response
    }

    /// Whether the rule fires at most once.
    #[must_use]
    pub const fn once(&self) -> bool {
        self.once
    }

    /// Whether matching is case-sensitive.
    #[must_use]
    pub const fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Delay before the response is written.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the rule participates in matching.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the rule has fired at least once.
    #[must_use]
    pub const fn fired(&self) -> bool {
        self.fired
    }

    /// Enable or disable the rule. A fired `once` rule stays spent.
    pub const fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether the rule may fire at all right now.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        self.active && !(self.once && self.fired)
    }

    /// Whether the rule is eligible and its pattern occurs in `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.is_eligible() && self.regex.is_match(text)
    }

    pub(crate) const fn mark_fired(&mut self) {
        self.fired = true;
    }
}

/// Builder for [`AutomationRule`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    pattern: String,
    response: Bytes,
    name: Option<String>,
    once: bool,
    case_sensitive: bool,
    delay: Duration,
    active: bool,
}

impl RuleBuilder {
    /// Create a builder with default flags.
    #[must_use]
    pub fn new(pattern: impl Into<String>, response: impl Into<Bytes>) -> Self {
        Self {
            pattern: pattern.into(),
            response: response.into(),
            name: None,
            once: true,
            case_sensitive: false,
            delay: Duration::ZERO,
            active: true,
        }
    }

    /// Name the rule.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fire at most once (default) or on every match.
    #[must_use]
    pub const fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Match case-sensitively.
    #[must_use]
    pub const fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Wait this long before writing the response.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Start enabled (default) or disabled.
    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Compile the pattern.
    pub fn build(self) -> Result<AutomationRule, RuleError> {
        let regex = RegexBuilder::new(&self.pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                rule: self.name.clone().unwrap_or_else(|| self.pattern.clone()),
                source,
            })?;

        Ok(AutomationRule {
            name: self.name,
            regex,
            response: self.response,
            once: self.once,
            case_sensitive: self.case_sensitive,
            delay: self.delay,
            active: self.active,
            fired: false,
        })
    }
}
