//! Error types for the scan pipeline.
//!
//! Only entry-page navigation failure, driver unavailability and the
//! umbrella timeout end a scan. Every other kind is recovered where it
//! happens and shows up as missing evidence instead.

use serde::{Deserialize, Serialize};

/// Why a navigation attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptFailure {
    Timeout,
    Transport,
}

/// The entry page could not be loaded within the attempt budget.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to load {url} after {attempts} attempt(s): {last_error}")]
pub struct NavigationFailure {
    pub url: String,
    pub attempts: u32,
    pub kind: AttemptFailure,
    pub last_error: String,
}

/// All errors that can occur while scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Navigation(#[from] NavigationFailure),

    #[error("Element interaction failed: {0}")]
    ElementInteraction(String),

    #[error("Sub-resource fetch failed for {url}: {reason}")]
    SubResourceFetch { url: String, reason: String },

    #[error("Browser driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Scan exceeded its {budget_ms}ms budget")]
    Timeout { budget_ms: u64 },
}

impl ScanError {
    /// Stable machine-readable kind, carried into degraded reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Navigation(_) => "navigation_failure",
            ScanError::ElementInteraction(_) => "element_interaction_failure",
            ScanError::SubResourceFetch { .. } => "sub_resource_fetch_failure",
            ScanError::DriverUnavailable(_) => "driver_unavailable",
            ScanError::Timeout { .. } => "scan_timeout",
        }
    }

    /// Whether this error ends the scan.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanError::Navigation(_) | ScanError::DriverUnavailable(_) | ScanError::Timeout { .. }
        )
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_terminality() {
        let nav = ScanError::from(NavigationFailure {
            url: "https://example.com".to_string(),
            attempts: 2,
            kind: AttemptFailure::Timeout,
            last_error: "navigation timed out after 10ms".to_string(),
        });
        assert_eq!(nav.kind(), "navigation_failure");
        assert!(nav.is_terminal());
        assert!(nav.to_string().contains("after 2 attempt(s)"));

        let click = ScanError::ElementInteraction("detached".to_string());
        assert_eq!(click.kind(), "element_interaction_failure");
        assert!(!click.is_terminal());

        assert!(ScanError::Timeout { budget_ms: 5 }.is_terminal());
    }
}
