// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Privacy scan core: audit a single web page for consent, cookie,
//! tracking and disclosure problems.
//!
//! A scan drives one browser session through a fixed pipeline:
//! navigate (with retry) → capture entry evidence → exercise the consent
//! controls → read the linked privacy policy → evaluate the rule catalog
//! → assemble a scored [`Report`].

pub mod config;
pub mod consent;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod navigation;
pub mod observe;
pub mod policy;
pub mod probes;
pub mod report;
pub mod rules;
pub mod scanner;

pub use config::{ScanConfig, ScanOptions, SeverityWeights};
pub use driver::chromium::ChromiumDriver;
pub use driver::{Driver, DriverSession, NoopDriver};
pub use error::{ScanError, ScanResult};
pub use evidence::EvidenceBundle;
pub use report::{Report, ScanFailure, Severity, Violation};
pub use rules::{DetectionRule, RuleMeta, RuleRegistry, Verdict, CATALOG_VERSION};
pub use scanner::{scan, scan_with_registry};
