//! Privacy policy discovery and disclosure analysis.

use crate::driver::{DriverSession, ElementInfo};
use crate::error::ScanError;
use crate::navigation::{navigate, RetryPolicy};
use serde::{Deserialize, Serialize};
use url::Url;

/// Characters of policy text kept as evidence.
pub const SNIPPET_CHARS: usize = 4000;

const RETENTION_KEYWORDS: &[&str] = &["retention", "retain", "storage period", "period"];
const THIRD_PARTY_KEYWORDS: &[&str] = &[
    "third party",
    "third-party",
    "vendors",
    "partners",
    "processors",
    "service providers",
];
const DELETION_KEYWORDS: &[&str] = &[
    "delete my",
    "erase my",
    "right to be forgotten",
    "remove my",
    "deletion",
];
const ACCESS_KEYWORDS: &[&str] = &[
    "access my data",
    "download my data",
    "request my data",
    "portability",
    "right of access",
];
const DO_NOT_SELL_KEYWORDS: &[&str] = &["do not sell", "do-not-sell", "sale of personal information"];

/// Which disclosure categories a policy text covers. No category implies
/// another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAnalysis {
    pub retention: bool,
    pub third_party: bool,
    pub deletion: bool,
    pub access: bool,
    pub do_not_sell: bool,
}

impl PolicyAnalysis {
    /// Names of the categories the policy fails to cover, in fixed order.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        [
            (self.retention, "retention_period"),
            (self.third_party, "third_party_disclosure"),
            (self.deletion, "data_deletion_info"),
            (self.access, "data_access_info"),
            (self.do_not_sell, "do_not_sell_optout"),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, name)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_sections().is_empty()
    }
}

/// Keyword analysis of policy text. Input is lowercased here.
pub fn analyze_policy_text(text: &str) -> PolicyAnalysis {
    let text = text.to_lowercase();
    let any = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));
    PolicyAnalysis {
        retention: any(RETENTION_KEYWORDS),
        third_party: any(THIRD_PARTY_KEYWORDS),
        deletion: any(DELETION_KEYWORDS),
        access: any(ACCESS_KEYWORDS),
        do_not_sell: any(DO_NOT_SELL_KEYWORDS),
    }
}

/// First anchor whose href or text mentions "privacy", resolved against
/// `base_url`. Script and mail links are skipped.
pub fn locate_policy_link(anchors: &[ElementInfo], base_url: &str) -> Option<Url> {
    let base = Url::parse(base_url).ok();

    anchors.iter().find_map(|a| {
        let href = a.href.as_deref().unwrap_or("").trim();
        let mentions = href.to_lowercase().contains("privacy") || a.text.to_lowercase().contains("privacy");
        if !mentions || href.is_empty() {
            return None;
        }
        let lowered = href.to_lowercase();
        if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") {
            return None;
        }
        match Url::parse(href) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => base.as_ref()?.join(href).ok(),
            Err(_) => None,
        }
    })
}

/// Outcome of the policy lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    /// No privacy link on the entry page.
    #[default]
    NotFound,
    /// Linked page loaded and analyzed.
    Analyzed,
    /// Link found but the page could not be loaded.
    Unreachable,
}

/// Privacy policy evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyPolicy {
    pub status: PolicyStatus,
    pub url: Option<String>,
    pub snippet: Option<String>,
    pub analysis: PolicyAnalysis,
    pub fetch_error: Option<String>,
}

impl PrivacyPolicy {
    /// A policy link exists, whether or not its page loaded.
    pub fn found(&self) -> bool {
        self.status != PolicyStatus::NotFound
    }
}

/// Load the policy page once and analyze it. Never fails the scan: an
/// unreachable page is reported as such with every category false.
pub async fn fetch_policy(
    session: &mut dyn DriverSession,
    link: &Url,
    policy: &RetryPolicy,
) -> PrivacyPolicy {
    let url = link.to_string();

    let loaded = match navigate(session, &url, policy).await {
        Ok(_) => session.content().await.map_err(|e| format!("{e:#}")),
        Err(failure) => Err(failure.last_error),
    };

    match loaded {
        Ok(html) => {
            let lower = html.to_lowercase();
            let analysis = analyze_policy_text(&lower);
            tracing::info!(
                "privacy policy {url}: missing {:?}",
                analysis.missing_sections()
            );
            PrivacyPolicy {
                status: PolicyStatus::Analyzed,
                url: Some(url),
                snippet: Some(lower.chars().take(SNIPPET_CHARS).collect()),
                analysis,
                fetch_error: None,
            }
        }
        Err(reason) => {
            let err = ScanError::SubResourceFetch {
                url: url.clone(),
                reason: reason.clone(),
            };
            tracing::warn!("{err}");
            PrivacyPolicy {
                status: PolicyStatus::Unreachable,
                url: Some(url),
                snippet: None,
                analysis: PolicyAnalysis::default(),
                fetch_error: Some(reason),
            }
        }
    }
}
