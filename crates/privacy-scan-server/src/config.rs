//! Configuration loading and path resolution.

use anyhow::Result;
use privacy_scan::ScanConfig;
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "PRIVACY_SCAN_CONFIG";
const CATALOG_ENV: &str = "PRIVACY_SCAN_CATALOG";
const AUDIT_ENV: &str = "PRIVACY_SCAN_AUDIT_LOG";
const LOCAL_DIR: &str = ".privacy-scan";

/// Load the scan config: explicit file, then `PRIVACY_SCAN_CONFIG`, then
/// defaults. Individual `PRIVACY_SCAN_*` variables apply on top.
pub fn load_scan_config(explicit: Option<&Path>) -> Result<ScanConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

    let config = match path {
        Some(path) => {
            tracing::info!("loading scan config from {}", path.display());
            ScanConfig::from_json_file(&path)?
        }
        None => ScanConfig::default(),
    };
    Ok(config.with_env_overrides())
}

/// Resolve a replacement remediation catalog. `None` means the embedded one.
pub fn resolve_catalog_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }
    if let Ok(env_path) = std::env::var(CATALOG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    let cwd_catalog = PathBuf::from(LOCAL_DIR).join("remediation.json");
    if cwd_catalog.exists() {
        return Some(cwd_catalog);
    }

    let home_catalog = home_dir().join(LOCAL_DIR).join("remediation.json");
    home_catalog.exists().then_some(home_catalog)
}

/// Resolve the audit log path.
pub fn resolve_audit_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    if let Ok(env_path) = std::env::var(AUDIT_ENV) {
        return PathBuf::from(env_path);
    }

    let cwd_log = PathBuf::from(LOCAL_DIR).join("audit.jsonl");
    if cwd_log.exists() {
        return cwd_log;
    }

    home_dir().join(LOCAL_DIR).join("audit.jsonl")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_paths_win() {
        assert_eq!(
            resolve_catalog_path(Some("/etc/fixes.json")),
            Some(PathBuf::from("/etc/fixes.json"))
        );
        assert_eq!(
            resolve_audit_path(Some("/tmp/audit.jsonl")),
            PathBuf::from("/tmp/audit.jsonl")
        );
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(&path, r#"{"scan_budget_ms": 1234}"#).unwrap();
        let config = load_scan_config(Some(&path)).unwrap();
        assert_eq!(config.scan_budget_ms, 1234);
        assert_eq!(config.settle_delay_ms, 3_000);
        assert!(load_scan_config(Some(&dir.path().join("nope.json"))).is_err());
    }
}
