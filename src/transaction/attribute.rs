//! Transaction attributes and rule-based rollback.

use crate::error::{ApplicationError, FailureKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an invocation relates to a transaction already in scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Join the current transaction or start one
    #[default]
    Required,
    /// Suspend the current transaction and start an independent one
    RequiresNew,
    Supports,
    NotSupported,
    Mandatory,
    Never,
    /// Savepoint within the current transaction
    Nested,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Rollback decision for failures whose label contains `pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRule {
    pub pattern: String,
    pub rollback: bool,
}

impl RollbackRule {
    pub fn rollback_for(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            rollback: true,
        }
    }

    pub fn no_rollback_for(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            rollback: false,
        }
    }

    pub fn matches(&self, error: &ApplicationError) -> bool {
        error.label().contains(self.pattern.as_str())
    }
}

/// Transaction definition resolved for one joinpoint.
///
/// Propagation, isolation, timeout, read-only and labels are passed through
/// to the manager untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionAttribute {
    pub name: Option<String>,
    /// Selects the transaction manager; `None` uses the default manager
    pub qualifier: Option<String>,
    pub propagation: Propagation,
    pub isolation: Isolation,
    pub timeout: Option<Duration>,
    pub read_only: bool,
    pub labels: Vec<String>,
    pub rollback_rules: Vec<RollbackRule>,
}

impl TransactionAttribute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_rollback_rule(mut self, rule: RollbackRule) -> Self {
        self.rollback_rules.push(rule);
        self
    }

    /// Whether `error` should roll the transaction back. The first matching
    /// rule decides; without a match, runtime and fatal failures roll back
    /// and checked failures commit.
    pub fn rollback_on(&self, error: &ApplicationError) -> bool {
        if let Some(rule) = self.rollback_rules.iter().find(|rule| rule.matches(error)) {
            return rule.rollback;
        }
        matches!(error.kind(), FailureKind::Runtime | FailureKind::Fatal)
    }

    /// Name the transaction after the joinpoint unless it already has a name
    pub fn with_default_name(mut self, joinpoint: &str) -> Self {
        if self.name.is_none() {
            self.name = Some(joinpoint.to_string());
        }
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rollback_predicate() {
        let attribute = TransactionAttribute::new();

        assert!(attribute.rollback_on(&ApplicationError::runtime("IllegalState", "boom")));
        assert!(attribute.rollback_on(&ApplicationError::fatal("OutOfMemory", "boom")));
        assert!(!attribute.rollback_on(&ApplicationError::checked("IoFailure", "boom")));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let attribute = TransactionAttribute::new()
            .with_rollback_rule(RollbackRule::rollback_for("InsufficientFunds"))
            .with_rollback_rule(RollbackRule::no_rollback_for("Funds"))
            .with_rollback_rule(RollbackRule::no_rollback_for("Validation"));

        assert!(attribute.rollback_on(&ApplicationError::checked("InsufficientFunds", "low")));
        assert!(!attribute.rollback_on(&ApplicationError::runtime("FrozenFunds", "frozen")));
        assert!(!attribute.rollback_on(&ApplicationError::runtime("ValidationFailure", "bad")));
        assert!(attribute.rollback_on(&ApplicationError::runtime("Unrelated", "x")));
    }

    #[test]
    fn test_default_name_only_fills_missing_name() {
        let unnamed = TransactionAttribute::new().with_default_name("OrderService.place");
        assert_eq!(unnamed.display_name(), "OrderService.place");

        let named = TransactionAttribute::new()
            .with_name("custom")
            .with_default_name("OrderService.place");
        assert_eq!(named.display_name(), "custom");
    }
}
