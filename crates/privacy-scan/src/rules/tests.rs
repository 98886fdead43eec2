use super::*;
use crate::config::SeverityWeights;
use crate::driver::CookieRecord;
use crate::evidence::{Anchor, ControlSummary, CookieSnapshots};
use crate::policy::{analyze_policy_text, PolicyAnalysis, PolicyStatus, PrivacyPolicy};
use crate::report::score;

fn cookie(name: &str, session: bool) -> CookieRecord {
    CookieRecord {
        name: name.to_string(),
        domain: ".example.com".to_string(),
        path: "/".to_string(),
        secure: true,
        http_only: true,
        same_site: Some("Lax".to_string()),
        session,
        expires: if session { -1.0 } else { 1_900_000_000.0 },
    }
}

/// A page that satisfies every rule in the catalog.
fn compliant() -> EvidenceBundle {
    EvidenceBundle {
        requested_url: "https://shop.example.com".to_string(),
        final_url: "https://shop.example.com/".to_string(),
        text: "<html><body><main>welcome to the shop</main>\
               <div role=\"dialog\">we use cookies. reject or accept them.</div>\
               <footer><a href=\"/privacy\">privacy policy</a> privacy settings, \
               withdraw consent, delete my data, \
               <a href=\"/do-not-sell\">do not sell my personal information</a>\
               </footer></body></html>"
            .to_string(),
        dialog_texts: vec!["we use cookies. reject or accept them.".to_string()],
        anchors: vec![
            Anchor {
                text: "privacy policy".to_string(),
                href: "/privacy".to_string(),
            },
            Anchor {
                text: "do not sell my personal information".to_string(),
                href: "/do-not-sell".to_string(),
            },
        ],
        controls: ControlSummary {
            accept: Some("Accept".to_string()),
            reject: Some("Reject".to_string()),
            manage: None,
        },
        control_labels: vec!["reject".to_string(), "accept".to_string()],
        scripts: vec!["https://shop.example.com/static/app.js".to_string()],
        cookies: CookieSnapshots {
            initial: vec![cookie("session_id", true)],
            post_reject_or_manage: Some(vec![cookie("session_id", true)]),
            post_accept: Some(vec![cookie("session_id", true)]),
            final_cookies: vec![cookie("session_id", true)],
        },
        requests: vec!["https://shop.example.com/static/app.js".to_string()],
        policy: PrivacyPolicy {
            status: PolicyStatus::Analyzed,
            url: Some("https://shop.example.com/privacy".to_string()),
            snippet: Some("...".to_string()),
            analysis: PolicyAnalysis {
                retention: true,
                third_party: true,
                deletion: true,
                access: true,
                do_not_sell: true,
            },
            fetch_error: None,
        },
        ..EvidenceBundle::default()
    }
}

fn fired(bundle: &EvidenceBundle) -> Vec<String> {
    RuleRegistry::default_catalog()
        .evaluate(bundle)
        .into_iter()
        .map(|v| v.id)
        .collect()
}

#[test]
fn test_catalog_order_and_uniqueness() {
    let registry = RuleRegistry::default_catalog();
    let ids: Vec<&str> = registry.metas().map(|m| m.id).collect();
    assert_eq!(ids.len(), 21);
    assert_eq!(ids[0], "missing_consent_banner");
    assert_eq!(ids[2], "cookies_before_consent");
    assert_eq!(ids[13], "insecure_transport");
    assert_eq!(ids[20], "non_compliant_plugins");

    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
}

#[test]
fn test_duplicate_registration_rejected() {
    let mut registry = RuleRegistry::default_catalog();
    let err = registry
        .register(Box::new(consent::missing_consent_banner()))
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicateRule("missing_consent_banner".to_string())
    );
    assert_eq!(registry.len(), 21);
}

#[test]
fn test_custom_rule_registers() {
    let mut registry = RuleRegistry::empty();
    assert!(registry.is_empty());
    registry
        .register(Box::new(FnRule::new(
            RuleMeta {
                id: "always",
                title: "Always",
                severity: Severity::Low,
                description: "",
                recommendation: "",
            },
            |_| Verdict::fire(serde_json::json!({})),
        )))
        .unwrap();
    let violations = registry.evaluate(&EvidenceBundle::default());
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].severity, Severity::Low);
    assert!(registry.get("always").is_some());
}

#[test]
fn test_compliant_page_has_no_violations() {
    assert_eq!(fired(&compliant()), Vec::<String>::new());
}

#[test]
fn test_no_banner_keyword() {
    let mut bundle = compliant();
    bundle.text = bundle.text.replace("we use cookies", "hello");
    bundle.dialog_texts.clear();

    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    let ids: Vec<&str> = violations.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["missing_consent_banner"]);
    assert_eq!(score(&violations, &SeverityWeights::default()), 90);
}

#[test]
fn test_accept_all_without_refusal() {
    let mut bundle = compliant();
    bundle.text = bundle.text.replace("reject or accept them", "accept all");
    bundle.dialog_texts = vec!["accept all".to_string()];
    bundle.controls = ControlSummary {
        accept: Some("Accept all".to_string()),
        reject: None,
        manage: None,
    };

    let ids = fired(&bundle);
    assert!(ids.contains(&"no_reject_option".to_string()));
    assert!(ids.contains(&"dark_pattern_consent_ui".to_string()));
    assert!(!ids.contains(&"missing_consent_banner".to_string()));
}

#[test]
fn test_persistent_cookie_before_consent() {
    let mut bundle = compliant();
    bundle.cookies.initial.push(cookie("_ga", false));

    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].id, "cookies_before_consent");
    assert_eq!(violations[0].evidence["initial_persistent"][0], "_ga");
    assert_eq!(score(&violations, &SeverityWeights::default()), 80);
}

#[test]
fn test_cookie_count_threshold() {
    let mut bundle = compliant();
    bundle.cookies.final_cookies = (0..25).map(|i| cookie(&format!("c{i}"), true)).collect();
    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].id, "excessive_cookie_count");
    assert_eq!(score(&violations, &SeverityWeights::default()), 98);

    bundle.cookies.final_cookies.truncate(19);
    assert!(fired(&bundle).is_empty());
}

#[test]
fn test_policy_missing_rights_sections() {
    let mut bundle = compliant();
    bundle.policy.analysis = analyze_policy_text("Data retention: 2 years. Third-party analytics.");

    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    let incomplete = violations
        .iter()
        .find(|v| v.id == "privacy_policy_incomplete")
        .unwrap();
    assert_eq!(
        incomplete.evidence["missing_sections"],
        serde_json::json!(["data_deletion_info", "data_access_info", "do_not_sell_optout"])
    );
    assert!(!violations.iter().any(|v| v.id == "missing_retention_policy"));
}

#[test]
fn test_unreachable_policy_counts_as_found() {
    let mut bundle = compliant();
    bundle.policy = PrivacyPolicy {
        status: PolicyStatus::Unreachable,
        url: Some("https://shop.example.com/privacy".to_string()),
        fetch_error: Some("net::ERR_TIMED_OUT".to_string()),
        ..PrivacyPolicy::default()
    };

    let ids = fired(&bundle);
    assert!(!ids.contains(&"missing_privacy_policy".to_string()));
    assert!(ids.contains(&"privacy_policy_incomplete".to_string()));
    assert!(ids.contains(&"missing_retention_policy".to_string()));
}

#[test]
fn test_trackers_without_disclosure() {
    let mut bundle = compliant();
    bundle
        .scripts
        .push("https://www.googletagmanager.com/gtm.js".to_string());
    bundle.policy.analysis.third_party = false;

    let ids = fired(&bundle);
    assert!(ids.contains(&"third_party_trackers".to_string()));
    assert!(ids.contains(&"third_party_sharing_undisclosed".to_string()));

    bundle.policy.analysis.third_party = true;
    let ids = fired(&bundle);
    assert!(ids.contains(&"third_party_trackers".to_string()));
    assert!(!ids.contains(&"third_party_sharing_undisclosed".to_string()));
}

#[test]
fn test_http_requests_flagged() {
    let mut bundle = compliant();
    bundle
        .requests
        .push("HTTP://legacy.example.com/pixel.gif".to_string());
    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].id, "insecure_transport");
    assert_eq!(violations[0].evidence["total"], 1);
}

#[test]
fn test_runtime_fingerprint_probe() {
    let mut bundle = compliant();
    bundle.fingerprint_probe = true;
    assert_eq!(fired(&bundle), vec!["fingerprinting".to_string()]);
}

#[test]
fn test_analytics_anonymization() {
    let mut bundle = compliant();
    bundle.text.push_str("<script>gtag('config', 'g-1');</script>");
    assert!(fired(&bundle).contains(&"analytics_without_anonymization".to_string()));

    bundle
        .text
        .push_str("<script>gtag('config', 'g-1', { 'anonymize_ip': true });</script>");
    assert!(!fired(&bundle).contains(&"analytics_without_anonymization".to_string()));
}

#[test]
fn test_evaluation_is_idempotent() {
    let mut bundle = compliant();
    bundle.storage.local.push("_hjid".to_string());
    bundle.scripts.push("https://static.hotjar.com/c/hotjar.js".to_string());

    let registry = RuleRegistry::default_catalog();
    let first = registry.evaluate(&bundle);
    let second = registry.evaluate(&bundle);
    assert_eq!(first, second);
    assert!(first.iter().any(|v| v.id == "non_compliant_plugins"));
    assert!(first.iter().any(|v| v.id == "local_session_storage"));
}

#[test]
fn test_cookie_without_secure_or_same_site() {
    let mut bundle = compliant();
    let mut plain = cookie("tracking_id", true);
    plain.secure = false;
    let mut lax_missing = cookie("pref", true);
    lax_missing.same_site = None;
    bundle.cookies.final_cookies.extend([plain, lax_missing]);

    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].id, "insecure_cookies");
    let insecure = violations[0].evidence["insecure"].as_array().unwrap();
    assert_eq!(insecure.len(), 2);
    assert_eq!(insecure[0]["name"], "tracking_id");
    assert_eq!(insecure[1]["name"], "pref");
}

#[test]
fn test_newsletter_without_marketing_consent() {
    let mut bundle = compliant();
    bundle.text = bundle.text.replace("withdraw consent, ", "");
    bundle
        .text
        .push_str("<form>subscribe to our newsletter</form>");
    assert_eq!(fired(&bundle), vec!["email_marketing_without_consent"]);

    bundle.text.push_str("<label>opt-in to our mailing list</label>");
    assert!(fired(&bundle).is_empty());
}

#[test]
fn test_no_do_not_sell_link() {
    let mut bundle = compliant();
    bundle.anchors.retain(|a| !a.text.contains("do not sell"));
    assert_eq!(fired(&bundle), vec!["missing_do_not_sell"]);
}

#[test]
fn test_no_withdraw_mechanism() {
    let mut bundle = compliant();
    bundle.text = bundle.text.replace("privacy settings, withdraw consent, ", "");
    assert_eq!(fired(&bundle), vec!["missing_withdraw_consent"]);
}

#[test]
fn test_no_access_or_deletion_mechanism() {
    let mut bundle = compliant();
    bundle.text = bundle.text.replace("delete my data", "contact us");
    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].id, "no_access_or_deletion_mechanism");
    assert_eq!(score(&violations, &SeverityWeights::default()), 90);
}

#[test]
fn test_client_storage_keys() {
    let mut bundle = compliant();
    bundle.storage.session.push("cart".to_string());

    let violations = RuleRegistry::default_catalog().evaluate(&bundle);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].id, "local_session_storage");
    assert_eq!(violations[0].evidence["sessionStorage"][0], "cart");
    assert_eq!(violations[0].evidence["localStorage"], serde_json::json!([]));
}
