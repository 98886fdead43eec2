//! Consent UX rules.

use super::{FnRule, RuleMeta, Verdict};
use crate::evidence::EvidenceBundle;
use crate::report::Severity;
use serde_json::json;

const BANNER_KEYWORDS: &[&str] = &[
    "cookie consent",
    "accept cookies",
    "cookie banner",
    "cookie settings",
    "manage cookies",
    "we use cookies",
    "accept all",
];
const WITHDRAW_KEYWORDS: &[&str] = &[
    "manage consent",
    "cookie settings",
    "privacy settings",
    "withdraw consent",
    "cookie preferences",
];
const MARKETING_KEYWORDS: &[&str] = &["newsletter", "subscribe"];
const MARKETING_CONSENT_KEYWORDS: &[&str] = &["consent", "i agree", "opt-in", "subscribe me"];

pub(super) fn missing_consent_banner() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "missing_consent_banner",
            title: "Missing Cookie Consent Banner",
            severity: Severity::High,
            description: "The site does not appear to show a cookie consent banner or dialog \
                          prior to loading cookies. GDPR requires valid consent before setting \
                          non-essential cookies.",
            recommendation: "Add a consent banner that blocks non-essential scripts and cookies \
                             until consent is obtained. Provide Accept, Reject and Preferences \
                             options and persist the consent status.",
        },
        |b: &EvidenceBundle| {
            let matched = b.banner_matches(BANNER_KEYWORDS);
            Verdict::when(
                matched.is_empty(),
                json!({ "matched": matched, "dialogs_inspected": b.dialog_texts.len() }),
            )
        },
    )
}

pub(super) fn no_reject_option() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "no_reject_option",
            title: "No Reject Option in Consent UI",
            severity: Severity::High,
            description: "No control labelled reject, decline or manage was found, so users \
                          cannot refuse non-essential cookies as easily as they accept them.",
            recommendation: "Offer a 'Reject' or 'Manage Preferences' control with the same \
                             visibility as 'Accept'.",
        },
        |b: &EvidenceBundle| {
            let found = b.controls.reject.is_some() || b.controls.manage.is_some();
            let sample: Vec<&String> = b.control_labels.iter().take(10).collect();
            Verdict::when(
                !found,
                json!({ "accept_control": b.controls.accept, "sample_texts": sample }),
            )
        },
    )
}

pub(super) fn email_marketing_without_consent() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "email_marketing_without_consent",
            title: "Email Marketing / Newsletter Without Clear Consent",
            severity: Severity::Medium,
            description: "Newsletter or subscription forms were detected without explicit \
                          consent language or an opt-in checkbox.",
            recommendation: "Use unchecked opt-in checkboxes, store consent logs for marketing \
                             communications and provide unsubscribe links.",
        },
        |b: &EvidenceBundle| {
            let marketing = b.text_matches(MARKETING_KEYWORDS);
            Verdict::when(
                !marketing.is_empty() && !b.text_contains_any(MARKETING_CONSENT_KEYWORDS),
                json!({ "matched": marketing }),
            )
        },
    )
}

pub(super) fn dark_pattern_consent_ui() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "dark_pattern_consent_ui",
            title: "Potential Dark Pattern in Consent UI",
            severity: Severity::High,
            description: "The page offers 'Accept all' but never mentions rejecting or \
                          declining, nudging users towards acceptance.",
            recommendation: "Present choices neutrally with equal emphasis and visibility for \
                             reject and accept.",
        },
        |b: &EvidenceBundle| {
            let accept_all = b.text.contains("accept all");
            let refusal = b.text_contains_any(&["reject", "decline"]);
            Verdict::when(
                accept_all && !refusal,
                json!({ "accept_all": accept_all, "reject_or_decline": refusal }),
            )
        },
    )
}

pub(super) fn missing_withdraw_consent() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "missing_withdraw_consent",
            title: "No Withdraw/Manage Consent Mechanism Detected",
            severity: Severity::Medium,
            description: "No persistent mechanism was found that lets users withdraw or manage \
                          consent they already gave.",
            recommendation: "Provide a persistent 'Manage Consent' or 'Privacy Settings' control \
                             reachable from the site footer.",
        },
        |b: &EvidenceBundle| {
            Verdict::when(
                !b.text_contains_any(WITHDRAW_KEYWORDS),
                json!({ "searched": WITHDRAW_KEYWORDS }),
            )
        },
    )
}
