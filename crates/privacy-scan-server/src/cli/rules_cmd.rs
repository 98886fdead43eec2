//! `privacy-scan rules` and `privacy-scan fix <id>`.

use anyhow::Result;
use privacy_scan::{RuleRegistry, CATALOG_VERSION};
use privacy_scan_server::config::resolve_catalog_path;
use privacy_scan_server::remediation::RemediationCatalog;

pub fn run(json: bool) -> Result<()> {
    let registry = RuleRegistry::default_catalog();

    if json {
        let rules: Vec<_> = registry.metas().collect();
        let out = serde_json::json!({ "catalog_version": CATALOG_VERSION, "rules": rules });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Rule catalog v{CATALOG_VERSION} ({} rules)", registry.len());
    for (i, meta) in registry.metas().enumerate() {
        println!("  {:>2}. {:<34} {:<8} {}", i + 1, meta.id, meta.severity, meta.title);
    }
    Ok(())
}

pub fn fix(violation_id: &str, catalog_path: Option<&str>) -> Result<()> {
    let catalog = match resolve_catalog_path(catalog_path) {
        Some(path) => RemediationCatalog::from_file(&path)?,
        None => RemediationCatalog::embedded()?,
    };
    let (snippet, _) = catalog.lookup(violation_id);

    println!("{}", snippet.title);
    println!("\n-- HTML --\n{}", snippet.html);
    println!("\n-- React --\n{}", snippet.react);
    Ok(())
}
