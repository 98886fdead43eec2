//! Detection rule catalog.
//!
//! Each rule is a pure predicate over a frozen [`EvidenceBundle`]: no
//! network, no DOM, no shared state. The registry evaluates them in a fixed
//! order and folds the firings into violations.

mod consent;
mod cookies;
mod disclosure;
mod tracking;

use crate::evidence::EvidenceBundle;
use crate::report::{Severity, Violation};
use serde::Serialize;
use serde_json::Value;

/// Version of the default catalog. Bumped whenever a rule is added,
/// removed, or changes meaning.
pub const CATALOG_VERSION: &str = "2.1.0";

/// Static description of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleMeta {
    pub id: &'static str,
    pub title: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub recommendation: &'static str,
}

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub triggered: bool,
    pub evidence: Value,
}

impl Verdict {
    pub fn fire(evidence: Value) -> Self {
        Self {
            triggered: true,
            evidence,
        }
    }

    pub fn clear() -> Self {
        Self {
            triggered: false,
            evidence: Value::Null,
        }
    }

    /// Fire with `evidence` when `condition` holds.
    pub fn when(condition: bool, evidence: Value) -> Self {
        if condition {
            Self::fire(evidence)
        } else {
            Self::clear()
        }
    }
}

/// A single detection rule.
pub trait DetectionRule: Send + Sync {
    fn meta(&self) -> &RuleMeta;
    fn evaluate(&self, bundle: &EvidenceBundle) -> Verdict;
}

/// A rule backed by a plain function.
pub struct FnRule {
    meta: RuleMeta,
    check: fn(&EvidenceBundle) -> Verdict,
}

impl FnRule {
    pub const fn new(meta: RuleMeta, check: fn(&EvidenceBundle) -> Verdict) -> Self {
        Self { meta, check }
    }
}

impl DetectionRule for FnRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn evaluate(&self, bundle: &EvidenceBundle) -> Verdict {
        (self.check)(bundle)
    }
}

/// Errors building a registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate rule id: {0}")]
    DuplicateRule(String),
}

/// An ordered set of rules with unique ids.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn DetectionRule>>,
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard catalog, in its fixed evaluation order.
    pub fn default_catalog() -> Self {
        let rules: Vec<FnRule> = vec![
            consent::missing_consent_banner(),
            consent::no_reject_option(),
            cookies::cookies_before_consent(),
            cookies::insecure_cookies(),
            disclosure::missing_privacy_policy(),
            disclosure::privacy_policy_incomplete(),
            tracking::third_party_trackers(),
            tracking::fingerprinting(),
            cookies::local_session_storage(),
            disclosure::collecting_pii(),
            disclosure::no_access_or_deletion_mechanism(),
            consent::email_marketing_without_consent(),
            consent::dark_pattern_consent_ui(),
            tracking::insecure_transport(),
            tracking::third_party_sharing_undisclosed(),
            tracking::analytics_without_anonymization(),
            cookies::excessive_cookie_count(),
            disclosure::missing_do_not_sell(),
            disclosure::missing_retention_policy(),
            consent::missing_withdraw_consent(),
            tracking::non_compliant_plugins(),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|r| Box::new(r) as Box<dyn DetectionRule>)
                .collect(),
        }
    }

    /// Append a rule. Ids must be unique.
    pub fn register(&mut self, rule: Box<dyn DetectionRule>) -> Result<(), RegistryError> {
        let id = rule.meta().id;
        if self.rules.iter().any(|r| r.meta().id == id) {
            return Err(RegistryError::DuplicateRule(id.to_string()));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule metadata in evaluation order.
    pub fn metas(&self) -> impl Iterator<Item = &RuleMeta> + '_ {
        self.rules.iter().map(|r| r.meta())
    }

    pub fn get(&self, id: &str) -> Option<&dyn DetectionRule> {
        self.rules
            .iter()
            .find(|r| r.meta().id == id)
            .map(|r| r.as_ref())
    }

    /// Evaluate every rule in order; each firing becomes one violation.
    pub fn evaluate(&self, bundle: &EvidenceBundle) -> Vec<Violation> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let verdict = rule.evaluate(bundle);
                verdict
                    .triggered
                    .then(|| Violation::from_rule(rule.meta(), verdict.evidence))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
