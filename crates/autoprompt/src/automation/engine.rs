//! Ordered, first-match-wins rule evaluation.

use std::time::Duration;

use bytes::Bytes;

use super::rule::AutomationRule;
use super::window::Lookbehind;
use crate::config::RuleConfig;
use crate::error::RuleError;

/// The outcome of a rule firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    /// Position of the rule in registration order.
    pub rule_index: usize,
    /// The rule's name, if any.
    pub name: Option<String>,
    /// Bytes to write to the session.
    pub response: Bytes,
    /// How long to wait before writing them.
    pub delay: Duration,
}

/// An ordered rule set.
///
/// Registration order is match priority and never changes. Firing state lives
/// in the rules; rebuilding the engine is the only way to reset it.
#[derive(Debug, Clone, Default)]
pub struct AutomationEngine {
    rules: Vec<AutomationRule>,
    window: Option<Lookbehind>,
}

impl AutomationEngine {
    /// Create an engine from rules in priority order.
    #[must_use]
    pub const fn new(rules: Vec<AutomationRule>) -> Self {
        Self {
            rules,
            window: None,
        }
    }

    /// Compile configured rules, stopping at the first invalid one.
    pub fn from_configs(configs: &[RuleConfig]) -> Result<Self, RuleError> {
        let rules = configs
            .iter()
            .map(RuleConfig::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Append a rule with the lowest priority so far.
    #[must_use]
    pub fn with_rule(mut self, rule: AutomationRule) -> Self {
        self.push(rule);
        self
    }

    /// Append a rule with the lowest priority so far.
    pub fn push(&mut self, rule: AutomationRule) {
        self.rules.push(rule);
    }

    /// Also match against up to `bytes` of earlier output. Zero disables it.
    #[must_use]
    pub fn with_lookbehind(mut self, bytes: usize) -> Self {
        self.window = (bytes > 0).then(|| Lookbehind::new(bytes));
        self
    }

    /// Configured look-behind in bytes.
    #[must_use]
    pub fn lookbehind(&self) -> usize {
        self.window.as_ref().map_or(0, Lookbehind::capacity)
    }

    /// The rules in priority order.
    #[must_use]
    pub fn rules(&self) -> &[AutomationRule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Enable or disable every rule called `name`. Returns how many changed.
    pub fn set_active(&mut self, name: &str, active: bool) -> usize {
        let mut changed = 0;
        for rule in self.rules.iter_mut().filter(|r| r.name() == Some(name)) {
            if rule.is_active() != active {
                rule.set_active(active);
                changed += 1;
            }
        }
        changed
    }

    /// Find the first eligible rule whose pattern occurs in `chunk`, mark it
    /// fired and return its response.
    pub fn evaluate(&mut self, chunk: &str) -> Option<Firing> {
        let haystack = match &mut self.window {
            Some(window) => window.push(chunk),
            None => chunk,
        };

        let rule_index = self.rules.iter().position(|rule| rule.matches(haystack))?;

        if let Some(window) = &mut self.window {
            window.clear();
        }
        let rule = &mut self.rules[rule_index];
        rule.mark_fired();
        tracing::debug!(rule = rule.label(), index = rule_index, "automation rule fired");

        Some(Firing {
            rule_index,
            name: rule.name().map(str::to_owned),
            response: rule.response().clone(),
            delay: rule.delay(),
        })
    }
}
