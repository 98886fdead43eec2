//! Cookie and client-storage rules.

use super::{FnRule, RuleMeta, Verdict};
use crate::driver::CookieRecord;
use crate::evidence::{CookieCheckpoint, EvidenceBundle};
use crate::report::Severity;
use serde_json::json;

/// Cookie count above which the jar is considered excessive.
pub const EXCESSIVE_COOKIE_THRESHOLD: usize = 20;

fn lacks_same_site(c: &CookieRecord) -> bool {
    c.same_site
        .as_deref()
        .map_or(true, |s| s.trim().is_empty() || s.eq_ignore_ascii_case("none"))
}

pub(super) fn cookies_before_consent() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "cookies_before_consent",
            title: "Cookies Set Before Consent",
            severity: Severity::Critical,
            description: "Persistent cookies were present immediately after the initial page \
                          load, before any consent control was used.",
            recommendation: "Do not set non-essential cookies until after explicit consent. \
                             Load analytics only after consent.",
        },
        |b: &EvidenceBundle| {
            let initial = b.cookies.at(CookieCheckpoint::Initial);
            let persistent: Vec<&str> = initial
                .iter()
                .filter(|c| c.is_persistent())
                .map(|c| c.name.as_str())
                .collect();
            Verdict::when(
                !persistent.is_empty(),
                json!({ "initial_count": initial.len(), "initial_persistent": persistent }),
            )
        },
    )
}

pub(super) fn insecure_cookies() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "insecure_cookies",
            title: "Insecure Cookies Detected",
            severity: Severity::Critical,
            description: "One or more cookies lack the Secure attribute or a restrictive \
                          SameSite attribute, increasing the attack surface.",
            recommendation: "Mark cookies Secure and HttpOnly where appropriate and set a \
                             SameSite attribute. Review server cookie configuration.",
        },
        |b: &EvidenceBundle| {
            let insecure: Vec<_> = b
                .cookies
                .at(CookieCheckpoint::Final)
                .iter()
                .filter(|c| !c.secure || lacks_same_site(c))
                .map(|c| json!({ "name": c.name, "secure": c.secure, "sameSite": c.same_site }))
                .collect();
            Verdict::when(!insecure.is_empty(), json!({ "insecure": insecure }))
        },
    )
}

pub(super) fn local_session_storage() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "local_session_storage",
            title: "Client-side Storage (localStorage/sessionStorage) Usage",
            severity: Severity::Medium,
            description: "The site stores keys in localStorage or sessionStorage, which can \
                          persist identifiers client-side and be used for tracking.",
            recommendation: "Do not persist personal identifiers in web storage. Use server-side \
                             sessions or anonymized tokens.",
        },
        |b: &EvidenceBundle| Verdict::when(!b.storage.is_empty(), json!(b.storage)),
    )
}

pub(super) fn excessive_cookie_count() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "excessive_cookie_count",
            title: "Excessive Cookie Count",
            severity: Severity::Low,
            description: "More than 20 cookies were set, which may indicate many trackers or \
                          redundant cookies.",
            recommendation: "Audit cookies, consolidate analytics tags and remove duplicate or \
                             unnecessary cookies.",
        },
        |b: &EvidenceBundle| {
            let count = b.cookies.at(CookieCheckpoint::Final).len();
            Verdict::when(
                count > EXCESSIVE_COOKIE_THRESHOLD,
                json!({ "cookie_count": count, "threshold": EXCESSIVE_COOKIE_THRESHOLD }),
            )
        },
    )
}
