//! Scan configuration.
//!
//! Defaults carry the timings the scanner has always used. A JSON file and a
//! handful of `PRIVACY_SCAN_*` environment variables can override them.

use crate::report::Severity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Desktop Chrome user agent presented by scan sessions.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/117.0.0.0 Safari/537.36";

/// Per-call scan contract: the knobs a caller may set on each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub save_screenshot: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        let config = ScanConfig::default();
        config.options()
    }
}

/// Score deduction per severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 20,
            high: 10,
            medium: 5,
            low: 2,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// How scan sessions launch the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Explicit Chromium binary. Discovered automatically when absent.
    pub chromium_path: Option<PathBuf>,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chromium_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_width: 1280,
            window_height: 800,
        }
    }
}

/// Full scan configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Entry navigation timeout per attempt.
    pub timeout_ms: u64,
    /// Entry navigation attempts (at least one is always made).
    pub max_attempts: u32,
    /// Fixed pause between navigation attempts.
    pub retry_backoff_ms: u64,
    /// Pause after a successful entry load, for deferred scripts and cookies.
    pub settle_delay_ms: u64,
    /// Pause after clicking reject or manage.
    pub reject_delay_ms: u64,
    /// Pause after clicking accept.
    pub accept_delay_ms: u64,
    /// Single-attempt timeout for the privacy policy page.
    pub policy_timeout_ms: u64,
    pub policy_settle_ms: u64,
    /// Upper bound on the whole pipeline.
    pub scan_budget_ms: u64,
    /// Time allowed for closing the session and draining queued page
    /// events once the pipeline ends.
    pub close_grace_ms: u64,
    pub save_screenshot: bool,
    pub screenshot_dir: PathBuf,
    pub weights: SeverityWeights,
    pub browser: BrowserConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            max_attempts: 2,
            retry_backoff_ms: 1_000,
            settle_delay_ms: 3_000,
            reject_delay_ms: 1_000,
            accept_delay_ms: 1_500,
            policy_timeout_ms: 30_000,
            policy_settle_ms: 1_000,
            scan_budget_ms: 300_000,
            close_grace_ms: 10_000,
            save_screenshot: false,
            screenshot_dir: PathBuf::from("."),
            weights: SeverityWeights::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Apply `PRIVACY_SCAN_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// ignored with a warning.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("ignoring invalid {key}={raw}");
                    None
                }
            }
        }

        if let Some(v) = parsed("PRIVACY_SCAN_TIMEOUT_MS", lookup("PRIVACY_SCAN_TIMEOUT_MS")) {
            self.timeout_ms = v;
        }
        if let Some(v) = parsed("PRIVACY_SCAN_MAX_ATTEMPTS", lookup("PRIVACY_SCAN_MAX_ATTEMPTS")) {
            self.max_attempts = v;
        }
        if let Some(v) = parsed("PRIVACY_SCAN_BUDGET_MS", lookup("PRIVACY_SCAN_BUDGET_MS")) {
            self.scan_budget_ms = v;
        }
        if let Some(dir) = lookup("PRIVACY_SCAN_SCREENSHOT_DIR").filter(|d| !d.trim().is_empty()) {
            self.screenshot_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("PRIVACY_SCAN_CHROMIUM_PATH").filter(|p| !p.trim().is_empty()) {
            self.browser.chromium_path = Some(PathBuf::from(path));
        }
        self
    }

    /// The per-call options this config implies.
    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            timeout_ms: self.timeout_ms,
            max_attempts: self.max_attempts,
            save_screenshot: self.save_screenshot,
        }
    }

    /// A copy with per-call options applied on top.
    pub fn with_options(&self, options: ScanOptions) -> Self {
        Self {
            timeout_ms: options.timeout_ms,
            max_attempts: options.max_attempts,
            save_screenshot: options.save_screenshot,
            ..self.clone()
        }
    }
}
