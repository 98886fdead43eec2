//! Tracking, fingerprinting and transport rules.

use super::{FnRule, RuleMeta, Verdict};
use crate::evidence::EvidenceBundle;
use crate::report::Severity;
use serde_json::{json, Value};

/// Tokens identifying analytics, advertising and tracking endpoints.
pub const TRACKER_TOKENS: &[&str] = &[
    "google-analytics",
    "googletagmanager",
    "doubleclick",
    "googlesyndication",
    "facebook",
    "connect.facebook.net",
    "hotjar",
    "tiktok",
    "segment.com",
    "segment.io",
    "mixpanel",
    "fullstory",
    "intercom",
    "linkedin",
    "adservice",
];

const FINGERPRINT_KEYWORDS: &[&str] = &[
    "fingerprintjs",
    "fingerprint2",
    "clientjs",
    "todataurl(",
    "audiocontext",
    "devicememory",
    "navigator.hardwareconcurrency",
];

const ANALYTICS_MARKERS: &[&str] = &["google-analytics", "gtag(", "analytics.js"];
const ANONYMIZE_MARKERS: &[&str] = &["anonymize_ip", "anonymizeip"];

const RISKY_PLUGINS: &[&str] = &["intercom", "hotjar", "drift", "fullstory", "mixpanel"];

const MAX_TRACKER_HITS: usize = 50;
const MAX_HTTP_RESOURCES: usize = 20;

/// Tracker matches across script sources, then requests.
fn tracker_hits(b: &EvidenceBundle) -> Vec<Value> {
    let scripts = b.scripts.iter().map(|s| ("script", s));
    let requests = b.requests.iter().map(|r| ("request", r));

    scripts
        .chain(requests)
        .flat_map(|(source, url)| {
            let low = url.to_lowercase();
            TRACKER_TOKENS
                .iter()
                .filter(move |t| low.contains(*t))
                .map(move |t| json!({ source: url, "matched": t }))
        })
        .take(MAX_TRACKER_HITS)
        .collect()
}

pub(super) fn third_party_trackers() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "third_party_trackers",
            title: "Third-Party Trackers Detected",
            severity: Severity::Medium,
            description: "Third-party analytics, advertising or tracking scripts were detected \
                          which may transmit user-identifying data to external domains.",
            recommendation: "Load third-party trackers only after consent. Minimize them or \
                             replace them with privacy-first analytics.",
        },
        |b: &EvidenceBundle| {
            let hits = tracker_hits(b);
            Verdict::when(!hits.is_empty(), json!({ "hits": hits }))
        },
    )
}

pub(super) fn fingerprinting() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "fingerprinting",
            title: "Browser Fingerprinting Detected",
            severity: Severity::Critical,
            description: "Scripts or DOM patterns indicate device or browser fingerprinting, \
                          which can uniquely identify users without consent.",
            recommendation: "Avoid fingerprinting or obtain explicit consent. Disclose it in the \
                             privacy policy and provide an opt-out.",
        },
        |b: &EvidenceBundle| {
            let mut hits: Vec<Value> = b
                .text_matches(FINGERPRINT_KEYWORDS)
                .into_iter()
                .map(|k| json!({ "source": "html", "matched": k }))
                .collect();
            hits.extend(
                b.scripts
                    .iter()
                    .filter(|s| {
                        let low = s.to_lowercase();
                        FINGERPRINT_KEYWORDS.iter().any(|k| low.contains(k))
                    })
                    .map(|s| json!({ "source": "script_src", "matched": s })),
            );
            if b.fingerprint_probe {
                hits.push(json!({ "source": "runtime", "matched": "canvas/webgl usage detected" }));
            }
            Verdict::when(!hits.is_empty(), json!({ "hits": hits }))
        },
    )
}

pub(super) fn insecure_transport() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "insecure_transport",
            title: "Insecure HTTP Resources Detected",
            severity: Severity::Critical,
            description: "The page loads resources or makes requests over plain HTTP, which \
                          allows interception and mixed-content issues.",
            recommendation: "Serve all resources over HTTPS, enable HSTS and use the \
                             'upgrade-insecure-requests' CSP directive.",
        },
        |b: &EvidenceBundle| {
            let http: Vec<&String> = b
                .requests
                .iter()
                .filter(|r| r.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("http://")))
                .collect();
            Verdict::when(
                !http.is_empty(),
                json!({
                    "http_resources": http.iter().take(MAX_HTTP_RESOURCES).collect::<Vec<_>>(),
                    "total": http.len(),
                }),
            )
        },
    )
}

pub(super) fn third_party_sharing_undisclosed() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "third_party_sharing_undisclosed",
            title: "Third-Party Data Sharing Not Disclosed",
            severity: Severity::High,
            description: "Trackers were detected but the privacy policy does not describe \
                          third-party sharing or processors.",
            recommendation: "Document all third-party processors and their purposes, sign DPAs, \
                             and state this in the privacy policy.",
        },
        |b: &EvidenceBundle| {
            let hits = tracker_hits(b);
            let disclosed = b.policy.found() && b.policy.analysis.third_party;
            Verdict::when(
                !hits.is_empty() && !disclosed,
                json!({ "trackers": hits, "privacy_disclosed": disclosed }),
            )
        },
    )
}

pub(super) fn analytics_without_anonymization() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "analytics_without_anonymization",
            title: "Analytics Not Configured with IP Anonymization",
            severity: Severity::Medium,
            description: "Google Analytics is present without anonymize_ip enabled, which may \
                          allow IP-based identification.",
            recommendation: "Enable anonymize_ip or adopt a privacy-first analytics solution.",
        },
        |b: &EvidenceBundle| {
            let analytics = b.text_matches(ANALYTICS_MARKERS);
            let anonymized = b.text_contains_any(ANONYMIZE_MARKERS);
            Verdict::when(
                !analytics.is_empty() && !anonymized,
                json!({ "analytics_present": analytics, "anonymize_detected": anonymized }),
            )
        },
    )
}

pub(super) fn non_compliant_plugins() -> FnRule {
    FnRule::new(
        RuleMeta {
            id: "non_compliant_plugins",
            title: "Potentially Non-Compliant Plugins",
            severity: Severity::Medium,
            description: "Session-replay, chat or product-analytics plugins were loaded. These \
                          commonly process personal data on behalf of the site.",
            recommendation: "Review each plugin and make sure Data Processing Agreements are in \
                             place.",
        },
        |b: &EvidenceBundle| {
            let found: Vec<&str> = RISKY_PLUGINS
                .iter()
                .copied()
                .filter(|p| b.scripts.iter().any(|s| s.to_lowercase().contains(p)))
                .collect();
            Verdict::when(!found.is_empty(), json!({ "plugins": found }))
        },
    )
}
