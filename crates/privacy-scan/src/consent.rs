//! Consent control discovery and interaction.
//!
//! Controls are classified by keyword, located once per session, then
//! exercised in a fixed order: reject (or manage) first, accept last.
//! Accepting first would make it impossible to see what the site does on
//! the reject path, which is the signal behind "cookies set regardless of
//! reject".

use crate::driver::{CookieRecord, DriverSession, ElementRef};
use crate::error::ScanError;
use crate::probes::CONTROL_SELECTOR;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REJECT_KEYWORDS: &[&str] = &[
    "reject",
    "decline",
    "deny",
    "refuse",
    "disagree",
    "no thanks",
];
const ACCEPT_KEYWORDS: &[&str] = &["accept", "agree", "allow all", "got it"];
const MANAGE_KEYWORDS: &[&str] = &[
    "manage",
    "preferences",
    "cookie settings",
    "customize",
    "customise",
    "privacy settings",
];

/// What a consent control does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRole {
    Accept,
    Reject,
    Manage,
}

/// Classify a control by its visible text.
///
/// Reject wins over accept so compound labels like "Decline and accept only
/// essential" are not read as acceptance; accept wins over manage.
pub fn classify(text: &str) -> Option<ControlRole> {
    let text = text.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    if has(REJECT_KEYWORDS) {
        Some(ControlRole::Reject)
    } else if has(ACCEPT_KEYWORDS) {
        Some(ControlRole::Accept)
    } else if has(MANAGE_KEYWORDS) {
        Some(ControlRole::Manage)
    } else {
        None
    }
}

/// A located control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    #[serde(skip)]
    pub handle: Option<ElementRef>,
    pub label: String,
}

/// The first control of each role, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentControls {
    pub accept: Option<Control>,
    pub reject: Option<Control>,
    pub manage: Option<Control>,
    /// Labels of every interactive element seen, for evidence.
    #[serde(skip)]
    pub labels: Vec<String>,
}

impl ConsentControls {
    /// Build from `(handle, text)` pairs in document order.
    pub fn from_candidates<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = (ElementRef, String)>,
    {
        let mut controls = Self::default();
        for (handle, text) in candidates {
            let label = text.trim().to_string();
            if label.is_empty() {
                continue;
            }
            let slot = match classify(&label) {
                Some(ControlRole::Accept) => &mut controls.accept,
                Some(ControlRole::Reject) => &mut controls.reject,
                Some(ControlRole::Manage) => &mut controls.manage,
                None => {
                    controls.labels.push(label);
                    continue;
                }
            };
            if slot.is_none() {
                *slot = Some(Control {
                    handle: Some(handle),
                    label: label.clone(),
                });
            }
            controls.labels.push(label);
        }
        controls
    }

    pub fn has_reject_path(&self) -> bool {
        self.reject.is_some() || self.manage.is_some()
    }
}

/// Query the page for consent controls. A failed query yields no controls.
pub async fn locate_controls(session: &mut dyn DriverSession) -> ConsentControls {
    match session.query_elements(CONTROL_SELECTOR).await {
        Ok(elements) => {
            let controls =
                ConsentControls::from_candidates(elements.into_iter().map(|e| (e.handle, e.text)));
            tracing::debug!(
                "consent controls: accept={:?} reject={:?} manage={:?}",
                controls.accept.as_ref().map(|c| &c.label),
                controls.reject.as_ref().map(|c| &c.label),
                controls.manage.as_ref().map(|c| &c.label),
            );
            controls
        }
        Err(e) => {
            tracing::warn!("failed to query consent controls: {e:#}");
            ConsentControls::default()
        }
    }
}

/// Cookie jar states around the consent interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieTimeline {
    pub initial: Vec<CookieRecord>,
    /// Present only when a reject or manage click went through.
    pub post_reject_or_manage: Option<Vec<CookieRecord>>,
    /// Present only when an accept click went through.
    pub post_accept: Option<Vec<CookieRecord>>,
}

/// Outcome of one click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InteractionOutcome {
    Clicked,
    Failed { reason: String },
}

/// One attempted interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub role: ControlRole,
    pub label: String,
    #[serde(flatten)]
    pub outcome: InteractionOutcome,
}

/// Waits after each interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionDelays {
    pub after_reject: Duration,
    pub after_accept: Duration,
}

/// Result of running the interaction protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentRun {
    pub timeline: CookieTimeline,
    pub interactions: Vec<Interaction>,
}

/// Run the interaction protocol:
///
/// 1. snapshot cookies (`initial`);
/// 2. click reject, or manage when there is no reject; wait; snapshot;
/// 3. click accept; wait; snapshot.
pub async fn simulate(
    session: &mut dyn DriverSession,
    controls: &ConsentControls,
    delays: InteractionDelays,
) -> ConsentRun {
    let mut run = ConsentRun {
        timeline: CookieTimeline {
            initial: read_cookies(session).await,
            ..CookieTimeline::default()
        },
        interactions: Vec::new(),
    };

    let first = controls
        .reject
        .as_ref()
        .map(|c| (ControlRole::Reject, c))
        .or_else(|| controls.manage.as_ref().map(|c| (ControlRole::Manage, c)));

    if let Some((role, control)) = first {
        if press(session, role, control, &mut run.interactions).await {
            tokio::time::sleep(delays.after_reject).await;
            run.timeline.post_reject_or_manage = Some(read_cookies(session).await);
        }
    }

    if let Some(control) = &controls.accept {
        if press(session, ControlRole::Accept, control, &mut run.interactions).await {
            tokio::time::sleep(delays.after_accept).await;
            run.timeline.post_accept = Some(read_cookies(session).await);
        }
    }

    run
}

async fn press(
    session: &mut dyn DriverSession,
    role: ControlRole,
    control: &Control,
    log: &mut Vec<Interaction>,
) -> bool {
    let result = match control.handle {
        Some(handle) => session.click(handle).await.map_err(|e| format!("{e:#}")),
        None => Err("control has no element handle".to_string()),
    };

    let outcome = match result {
        Ok(()) => {
            tracing::info!("clicked {role:?} control \"{}\"", control.label);
            InteractionOutcome::Clicked
        }
        Err(reason) => {
            let err = ScanError::ElementInteraction(reason.clone());
            tracing::warn!("{role:?} control \"{}\": {err}", control.label);
            InteractionOutcome::Failed { reason }
        }
    };
    let clicked = outcome == InteractionOutcome::Clicked;

    log.push(Interaction {
        role,
        label: control.label.clone(),
        outcome,
    });
    clicked
}

async fn read_cookies(session: &dyn DriverSession) -> Vec<CookieRecord> {
    session.cookies().await.unwrap_or_else(|e| {
        tracing::warn!("cookie read failed: {e:#}");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_basic() {
        assert_eq!(classify("Accept all cookies"), Some(ControlRole::Accept));
        assert_eq!(classify("I AGREE"), Some(ControlRole::Accept));
        assert_eq!(classify("Reject all"), Some(ControlRole::Reject));
        assert_eq!(classify("Manage preferences"), Some(ControlRole::Manage));
        assert_eq!(classify("Read more"), None);
    }

    #[test]
    fn test_generic_settings_is_not_a_consent_control() {
        assert_eq!(classify("Account settings"), None);
        assert_eq!(classify("Settings"), None);
        assert_eq!(classify("Privacy settings"), Some(ControlRole::Manage));
        assert_eq!(classify("Cookie Settings"), Some(ControlRole::Manage));
    }

    #[test]
    fn test_disagree_is_reject() {
        assert_eq!(classify("Disagree"), Some(ControlRole::Reject));
        assert_eq!(classify("I disagree"), Some(ControlRole::Reject));
    }

    #[test]
    fn test_reject_beats_accept_in_compound_text() {
        assert_eq!(
            classify("Decline and accept only essential"),
            Some(ControlRole::Reject)
        );
        assert_eq!(classify("Don't accept, deny"), Some(ControlRole::Reject));
    }

    #[test]
    fn test_accept_beats_manage() {
        assert_eq!(
            classify("Accept cookie settings"),
            Some(ControlRole::Accept)
        );
    }

    #[test]
    fn test_first_control_per_role_wins() {
        let controls = ConsentControls::from_candidates(vec![
            (ElementRef(0), "Home".to_string()),
            (ElementRef(1), "Accept".to_string()),
            (ElementRef(2), "Accept all".to_string()),
            (ElementRef(3), "  ".to_string()),
            (ElementRef(4), "Cookie settings".to_string()),
        ]);
        assert_eq!(controls.accept.as_ref().unwrap().handle, Some(ElementRef(1)));
        assert!(controls.reject.is_none());
        assert_eq!(controls.manage.as_ref().unwrap().label, "Cookie settings");
        assert!(controls.has_reject_path());
        assert_eq!(controls.labels.len(), 4);
    }
}
