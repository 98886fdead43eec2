//! `privacy-scan serve`: run the REST API.

use anyhow::Result;
use privacy_scan::driver::chromium::find_chromium;
use privacy_scan::{ChromiumDriver, RuleRegistry};
use privacy_scan_server::audit::AuditLogger;
use privacy_scan_server::config::{load_scan_config, resolve_audit_path, resolve_catalog_path};
use privacy_scan_server::remediation::RemediationCatalog;
use privacy_scan_server::rest::{self, AppState};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct ServeArgs {
    pub addr: String,
    pub catalog: Option<String>,
    pub audit_log: Option<String>,
    pub no_audit: bool,
}

pub async fn run(config_path: Option<&Path>, args: ServeArgs) -> Result<()> {
    let config = load_scan_config(config_path)?;

    if config.browser.chromium_path.is_none() && find_chromium().is_none() {
        tracing::warn!("Chromium not found; scans will report driver_unavailable");
    }

    let catalog = match resolve_catalog_path(args.catalog.as_deref()) {
        Some(path) => {
            tracing::info!("remediation catalog: {}", path.display());
            RemediationCatalog::from_file(&path)?
        }
        None => RemediationCatalog::embedded()?,
    };

    let audit = if args.no_audit {
        None
    } else {
        let path = resolve_audit_path(args.audit_log.as_deref());
        tracing::info!("audit log: {}", path.display());
        Some(Mutex::new(AuditLogger::open(&path)?))
    };

    let state = Arc::new(AppState {
        driver: Arc::new(ChromiumDriver::new(config.browser.clone())),
        config,
        registry: RuleRegistry::default_catalog(),
        catalog,
        audit,
    });

    rest::start(&args.addr, state).await
}
