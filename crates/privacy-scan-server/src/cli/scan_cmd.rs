//! `privacy-scan scan <url>`: scan one page and print the report.

use anyhow::{bail, Result};
use privacy_scan::{scan, ChromiumDriver, Report, Severity};
use privacy_scan_server::audit::AuditLogger;
use privacy_scan_server::config::{load_scan_config, resolve_audit_path};
use std::path::Path;

pub struct ScanArgs {
    pub url: String,
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub screenshot: bool,
    pub json: bool,
    pub audit_log: Option<String>,
    pub no_audit: bool,
}

pub async fn run(config_path: Option<&Path>, args: ScanArgs) -> Result<()> {
    let config = load_scan_config(config_path)?;

    let mut options = config.options();
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout_ms = timeout_ms;
    }
    if let Some(max_attempts) = args.max_attempts {
        options.max_attempts = max_attempts;
    }
    options.save_screenshot |= args.screenshot;

    let driver = ChromiumDriver::new(config.browser.clone());
    let report = scan(&driver, &args.url, options, &config).await;

    if !args.no_audit {
        let path = resolve_audit_path(args.audit_log.as_deref());
        match AuditLogger::open(&path) {
            Ok(mut logger) => {
                if let Err(e) = logger.log_report(&report, "cli") {
                    tracing::warn!("failed to write audit event: {e:#}");
                }
            }
            Err(e) => tracing::warn!("audit log unavailable: {e:#}"),
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(failure) = &report.error {
        bail!("scan failed ({}): {}", failure.kind, failure.message);
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("Privacy scan: {}", report.url);
    if let Some(final_url) = report.final_url.as_deref().filter(|u| *u != report.url) {
        println!("  Final URL: {final_url}");
    }
    println!("  Score:     {}/100", report.score);
    println!(
        "  Issues:    {} critical, {} high, {} medium, {} low",
        report.count(Severity::Critical),
        report.count(Severity::High),
        report.count(Severity::Medium),
        report.count(Severity::Low),
    );
    println!("  Duration:  {}ms", report.duration_ms);
    if let Some(path) = &report.metadata.screenshot {
        println!("  Screenshot: {path}");
    }

    if report.violations.is_empty() {
        return;
    }
    println!();
    for v in &report.violations {
        println!("  [{:<8}] {} ({})", v.severity, v.title, v.id);
        println!("             {}", v.recommendation);
    }
}
