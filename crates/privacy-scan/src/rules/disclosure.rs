//! Privacy disclosure and data-subject-rights rules.

use super::{FnRule, RuleMeta, Verdict};
use crate::evidence::EvidenceBundle;
use crate::report::Severity;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

const PII_KEYWORDS: &[&str] = &[
    "name=",
    "email",
    "phone",
    "tel:",
    "address",
    "dob",
    "birth",
    "date of birth",
    "ssn",
    "social security",
];
const DO_NOT_SELL_KEYWORDS: &[&str] = &["do not sell", "do-not-sell"];
const ACCESS_OR_DELETION_KEYWORDS: &[&str] = &[
    "access my data",
    "download my data",
    "request my data",
    "delete my data",
    "erase my data",
    "right to be forgotten",
];

/// Form inputs that collect personal data by type or autocomplete hint.
static PII_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<input[^>]*(type\s*=\s*["']?(email|tel)|autocomplete\s*=\s*["']?(name|email|tel|street-address|bday))"#,
    )
    .unwrap_or_else(|e| panic!("invalid PII input pattern: {e}"))
});

pub(super) fn missing_privacy_policy() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "missing_privacy_policy",
            title: "Missing Privacy Policy",
            severity: Severity::High,
            description: "No privacy policy link was found on the page. A privacy policy is \
                          required to explain how personal data is processed.",
            recommendation: "Publish a privacy policy and link it from every page, usually in \
                             the footer and in the consent banner.",
        },
        |b: &EvidenceBundle| {
            Verdict::when(
                !b.policy.found(),
                json!({ "anchors_inspected": b.anchors.len() }),
            )
        },
    )
}

pub(super) fn privacy_policy_incomplete() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "privacy_policy_incomplete",
            title: "Privacy Policy Incomplete",
            severity: Severity::Medium,
            description: "The privacy policy does not cover every required topic: retention, \
                          third-party disclosure, deletion, access and the right to opt out of \
                          sale.",
            recommendation: "Extend the privacy policy with the missing sections listed in the \
                             evidence.",
        },
        |b: &EvidenceBundle| {
            let missing = b.policy.analysis.missing_sections();
            Verdict::when(
                b.policy.found() && !missing.is_empty(),
                json!({
                    "missing_sections": missing,
                    "privacy_url": b.policy.url,
                    "status": b.policy.status,
                }),
            )
        },
    )
}

pub(super) fn collecting_pii() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "collecting_pii",
            title: "Collecting Personally Identifiable Information",
            severity: Severity::High,
            description: "The page appears to collect personal data such as names, email \
                          addresses, phone numbers or dates of birth.",
            recommendation: "Collect only what is necessary, state the purpose next to the form \
                             and link the privacy policy before submission.",
        },
        |b: &EvidenceBundle| {
            let keywords = b.text_matches(PII_KEYWORDS);
            let fields: Vec<&str> = PII_INPUT
                .find_iter(&b.text)
                .map(|m| m.as_str())
                .take(10)
                .collect();
            Verdict::when(
                !keywords.is_empty() || !fields.is_empty(),
                json!({ "keywords": keywords, "input_fields": fields }),
            )
        },
    )
}

pub(super) fn no_access_or_deletion_mechanism() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "no_access_or_deletion_mechanism",
            title: "No Data Access or Deletion Mechanism",
            severity: Severity::High,
            description: "No way to access, download or delete personal data was found on the \
                          page.",
            recommendation: "Add a 'Request My Data' and 'Delete My Data' flow, for example a \
                             form or a dedicated email address.",
        },
        |b: &EvidenceBundle| {
            Verdict::when(
                !b.text_contains_any(ACCESS_OR_DELETION_KEYWORDS),
                json!({ "searched": ACCESS_OR_DELETION_KEYWORDS }),
            )
        },
    )
}

pub(super) fn missing_do_not_sell() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "missing_do_not_sell",
            title: "Missing 'Do Not Sell My Personal Information' Link",
            severity: Severity::High,
            description: "No link allowing users to opt out of the sale of their personal \
                          information was found (CCPA).",
            recommendation: "Add a clearly labelled 'Do Not Sell My Personal Information' link \
                             to the site footer.",
        },
        |b: &EvidenceBundle| {
            Verdict::when(
                !b.anchor_matches(DO_NOT_SELL_KEYWORDS),
                json!({ "anchors_inspected": b.anchors.len() }),
            )
        },
    )
}

pub(super) fn missing_retention_policy() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "missing_retention_policy",
            title: "Missing Data Retention Policy",
            severity: Severity::Medium,
            description: "The privacy policy does not state how long personal data is kept.",
            recommendation: "State retention periods for each category of personal data in the \
                             privacy policy.",
        },
        |b: &EvidenceBundle| {
            Verdict::when(
                b.policy.found() && !b.policy.analysis.retention,
                json!({ "privacy_url": b.policy.url }),
            )
        },
    )
}
