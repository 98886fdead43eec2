//! Report assembly and scoring.

use crate::config::SeverityWeights;
use crate::consent::Interaction;
use crate::error::ScanError;
use crate::evidence::{ControlSummary, EvidenceBundle, StorageKeys};
use crate::observe::{ResponseStatus, CONSOLE_SAMPLE, REQUEST_SAMPLE, RESPONSE_SAMPLE, SCRIPT_SAMPLE};
use crate::policy::PrivacyPolicy;
use crate::rules::{RuleMeta, RuleRegistry, CATALOG_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        f.pad(name)
    }
}

/// One rule firing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub evidence: Value,
}

impl Violation {
    pub fn from_rule(meta: &RuleMeta, evidence: Value) -> Self {
        Self {
            id: meta.id.to_string(),
            title: meta.title.to_string(),
            severity: meta.severity,
            description: meta.description.to_string(),
            recommendation: meta.recommendation.to_string(),
            evidence,
        }
    }
}

/// `100 - Σ weight(severity)`, floored at zero.
pub fn score(violations: &[Violation], weights: &SeverityWeights) -> u32 {
    let deduction = violations
        .iter()
        .fold(0u32, |acc, v| acc.saturating_add(weights.weight(v.severity)));
    100u32.saturating_sub(deduction)
}

/// Bounded evidence carried alongside the violations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub navigation_attempts: u32,
    pub initial_cookie_count: usize,
    pub initial_cookie_names: Vec<String>,
    pub post_reject_cookie_count: Option<usize>,
    pub post_accept_cookie_count: Option<usize>,
    pub final_cookie_count: usize,
    pub scripts_sample: Vec<String>,
    pub requests_sample: Vec<String>,
    pub responses_sample: Vec<ResponseStatus>,
    pub console_sample: Vec<String>,
    pub privacy: PrivacyPolicy,
    pub local_session_storage: StorageKeys,
    pub consent_controls: ControlSummary,
    pub interactions: Vec<Interaction>,
    pub screenshot: Option<String>,
}

/// Why a scan produced no findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl From<&ScanError> for ScanFailure {
    fn from(err: &ScanError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            attempts: match err {
                ScanError::Navigation(failure) => Some(failure.attempts),
                _ => None,
            },
        }
    }
}

/// The result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub scan_id: String,
    pub url: String,
    pub final_url: Option<String>,
    pub score: u32,
    pub violations: Vec<Violation>,
    pub summary: String,
    pub metadata: ReportMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ScanFailure>,
    pub scanned_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub catalog_version: String,
}

/// Facts about the scan run that are not evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub navigation_attempts: u32,
    pub screenshot: Option<String>,
    pub duration_ms: u64,
}

impl Report {
    /// A report for a scan that could not complete.
    pub fn degraded(url: &str, err: &ScanError) -> Self {
        let failure = ScanFailure::from(err);
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            final_url: None,
            score: 0,
            violations: Vec::new(),
            summary: format!("Scan failed: {}", failure.message),
            metadata: ReportMetadata {
                navigation_attempts: failure.attempts.unwrap_or(0),
                ..ReportMetadata::default()
            },
            error: Some(failure),
            scanned_at: Utc::now(),
            duration_ms: 0,
            catalog_version: CATALOG_VERSION.to_string(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Violations at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }
}

/// Evaluate `registry` over a frozen bundle and package the result.
pub fn assemble(
    bundle: &EvidenceBundle,
    registry: &RuleRegistry,
    weights: &SeverityWeights,
    context: ScanContext,
) -> Report {
    let violations = registry.evaluate(bundle);
    let score = score(&violations, weights);
    let cookies = &bundle.cookies;

    let metadata = ReportMetadata {
        navigation_attempts: context.navigation_attempts,
        initial_cookie_count: cookies.initial.len(),
        initial_cookie_names: cookies.initial.iter().map(|c| c.name.clone()).collect(),
        post_reject_cookie_count: cookies.post_reject_or_manage.as_ref().map(Vec::len),
        post_accept_cookie_count: cookies.post_accept.as_ref().map(Vec::len),
        final_cookie_count: cookies.final_cookies.len(),
        scripts_sample: sample(&bundle.scripts, SCRIPT_SAMPLE),
        requests_sample: sample(&bundle.requests, REQUEST_SAMPLE),
        responses_sample: sample(&bundle.responses, RESPONSE_SAMPLE),
        console_sample: sample(&bundle.console, CONSOLE_SAMPLE),
        privacy: bundle.policy.clone(),
        local_session_storage: bundle.storage.clone(),
        consent_controls: bundle.controls.clone(),
        interactions: bundle.interactions.clone(),
        screenshot: context.screenshot,
    };

    Report {
        scan_id: uuid::Uuid::new_v4().to_string(),
        url: bundle.requested_url.clone(),
        final_url: Some(bundle.final_url.clone()),
        score,
        summary: format!("Detected {} issue(s)", violations.len()),
        violations,
        metadata,
        error: None,
        scanned_at: Utc::now(),
        duration_ms: context.duration_ms,
        catalog_version: CATALOG_VERSION.to_string(),
    }
}

fn sample<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items.iter().take(limit).cloned().collect()
}
