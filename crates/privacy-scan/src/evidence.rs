//! The frozen evidence a scan hands to the rule catalog.
//!
//! Everything here is plain owned data. Rules read it and nothing else, so a
//! bundle built by hand in a test is indistinguishable from one captured
//! from a live page. Missing signals are empty values, never errors.

use crate::consent::{ConsentControls, Interaction};
use crate::driver::{CookieRecord, ElementInfo};
use crate::observe::ResponseStatus;
use crate::policy::PrivacyPolicy;
use serde::{Deserialize, Serialize};

/// Points at which the cookie jar is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieCheckpoint {
    Initial,
    PostRejectOrManage,
    PostAccept,
    Final,
}

/// Cookie jar contents at each checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieSnapshots {
    pub initial: Vec<CookieRecord>,
    pub post_reject_or_manage: Option<Vec<CookieRecord>>,
    pub post_accept: Option<Vec<CookieRecord>>,
    /// Read once the whole pipeline has run.
    pub final_cookies: Vec<CookieRecord>,
}

impl CookieSnapshots {
    /// Cookies at `checkpoint`; empty when that checkpoint was never reached.
    pub fn at(&self, checkpoint: CookieCheckpoint) -> &[CookieRecord] {
        match checkpoint {
            CookieCheckpoint::Initial => &self.initial,
            CookieCheckpoint::PostRejectOrManage => {
                self.post_reject_or_manage.as_deref().unwrap_or(&[])
            }
            CookieCheckpoint::PostAccept => self.post_accept.as_deref().unwrap_or(&[]),
            CookieCheckpoint::Final => &self.final_cookies,
        }
    }
}

/// Keys in client-side storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    #[serde(rename = "localStorage")]
    pub local: Vec<String>,
    #[serde(rename = "sessionStorage")]
    pub session: Vec<String>,
}

impl StorageKeys {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.session.is_empty()
    }
}

/// An anchor on the entry page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// Lowercase visible text.
    pub text: String,
    pub href: String,
}

impl From<&ElementInfo> for Anchor {
    fn from(e: &ElementInfo) -> Self {
        Self {
            text: e.text.to_lowercase(),
            href: e.href.clone().unwrap_or_default(),
        }
    }
}

/// Labels of the consent controls that were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSummary {
    pub accept: Option<String>,
    pub reject: Option<String>,
    pub manage: Option<String>,
}

impl From<&ConsentControls> for ControlSummary {
    fn from(c: &ConsentControls) -> Self {
        Self {
            accept: c.accept.as_ref().map(|x| x.label.clone()),
            reject: c.reject.as_ref().map(|x| x.label.clone()),
            manage: c.manage.as_ref().map(|x| x.label.clone()),
        }
    }
}

/// Everything observed during one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub requested_url: String,
    pub final_url: String,
    /// Lowercase document markup plus a sample of inline script text.
    pub text: String,
    /// Lowercase text of banner-like containers.
    pub dialog_texts: Vec<String>,
    pub anchors: Vec<Anchor>,
    pub controls: ControlSummary,
    /// Lowercase labels of every interactive element.
    pub control_labels: Vec<String>,
    pub scripts: Vec<String>,
    pub cookies: CookieSnapshots,
    pub storage: StorageKeys,
    pub requests: Vec<String>,
    pub responses: Vec<ResponseStatus>,
    pub console: Vec<String>,
    /// Inline scripts read canvas pixels or open WebGL.
    pub fingerprint_probe: bool,
    pub policy: PrivacyPolicy,
    pub interactions: Vec<Interaction>,
}

impl EvidenceBundle {
    /// Keywords from `keywords` found in the page text.
    pub fn text_matches<'k>(&self, keywords: &[&'k str]) -> Vec<&'k str> {
        keywords
            .iter()
            .copied()
            .filter(|k| self.text.contains(k))
            .collect()
    }

    pub fn text_contains_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.text.contains(k))
    }

    /// Keywords found in the page text or any banner container.
    pub fn banner_matches<'k>(&self, keywords: &[&'k str]) -> Vec<&'k str> {
        keywords
            .iter()
            .copied()
            .filter(|k| self.text.contains(k) || self.dialog_texts.iter().any(|d| d.contains(k)))
            .collect()
    }

    /// Whether any anchor's text or href contains one of `keywords`.
    pub fn anchor_matches(&self, keywords: &[&str]) -> bool {
        self.anchors.iter().any(|a| {
            let href = a.href.to_lowercase();
            keywords.iter().any(|k| a.text.contains(k) || href.contains(k))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoints_are_empty() {
        let snaps = CookieSnapshots::default();
        assert!(snaps.at(CookieCheckpoint::PostAccept).is_empty());
        assert!(snaps.at(CookieCheckpoint::PostRejectOrManage).is_empty());
    }

    #[test]
    fn test_banner_matches_dialogs() {
        let bundle = EvidenceBundle {
            text: "<html>welcome</html>".to_string(),
            dialog_texts: vec!["we use cookies to improve".to_string()],
            ..EvidenceBundle::default()
        };
        assert_eq!(
            bundle.banner_matches(&["cookie consent", "we use cookies"]),
            vec!["we use cookies"]
        );
        assert!(!bundle.text_contains_any(&["we use cookies"]));
    }

    #[test]
    fn test_anchor_href_match_is_case_insensitive() {
        let bundle = EvidenceBundle {
            anchors: vec![Anchor {
                text: "ccpa".to_string(),
                href: "/Do-Not-Sell".to_string(),
            }],
            ..EvidenceBundle::default()
        };
        assert!(bundle.anchor_matches(&["do-not-sell"]));
    }

    #[test]
    fn test_storage_serializes_with_browser_names() {
        let keys = StorageKeys {
            local: vec!["_hjid".to_string()],
            session: Vec::new(),
        };
        let json = serde_json::to_value(&keys).unwrap();
        assert_eq!(json["localStorage"][0], "_hjid");
        assert!(!keys.is_empty());
    }
}
