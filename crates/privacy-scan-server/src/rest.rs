// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for privacy scans.
//!
//! Every response is a JSON envelope: `{"status": "success", "data": ...}`
//! or `{"status": "error", "message": ...}`. A degraded scan report is still
//! a success at the envelope level; its `error` field says what went wrong.

use crate::audit::AuditLogger;
use crate::remediation::RemediationCatalog;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use privacy_scan::{scan_with_registry, Driver, RuleRegistry, ScanConfig, ScanOptions, CATALOG_VERSION};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// State shared by every handler.
pub struct AppState {
    pub driver: Arc<dyn Driver>,
    pub config: ScanConfig,
    pub registry: RuleRegistry,
    pub catalog: RemediationCatalog,
    /// Scans are appended here when set.
    pub audit: Option<Mutex<AuditLogger>>,
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/scan", get(handle_scan))
        .route("/fix", get(handle_fix))
        .route("/rules", get(handle_rules))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until the process stops.
pub async fn start(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

fn success(data: impl serde::Serialize) -> Json<Value> {
    match serde_json::to_value(data) {
        Ok(data) => Json(json!({ "status": "success", "data": data })),
        Err(e) => failure(format!("failed to encode response: {e}")),
    }
}

fn failure(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "status": "error", "message": message.into() }))
}

/// Validate the `url` parameter: present, absolute, http or https.
fn target_url(params: &HashMap<String, String>) -> Result<String, String> {
    let raw = params
        .get("url")
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| "missing required parameter 'url'".to_string())?;
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid url '{raw}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        other => Err(format!("unsupported url scheme '{other}'")),
    }
}

fn parse_param<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, String> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid value for '{key}': {raw}")),
    }
}

/// Per-request options over the server defaults.
fn scan_options(
    params: &HashMap<String, String>,
    defaults: ScanOptions,
) -> Result<ScanOptions, String> {
    Ok(ScanOptions {
        timeout_ms: parse_param(params, "timeout_ms")?.unwrap_or(defaults.timeout_ms),
        max_attempts: parse_param(params, "max_attempts")?.unwrap_or(defaults.max_attempts),
        save_screenshot: parse_param(params, "save_screenshot")?
            .unwrap_or(defaults.save_screenshot),
    })
}

// ── Handlers ────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "catalog_version": CATALOG_VERSION,
        "rules": state.registry.len(),
        "snippets": state.catalog.len(),
    }))
}

async fn handle_scan(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let url = match target_url(&params) {
        Ok(url) => url,
        Err(message) => return failure(message),
    };
    let options = match scan_options(&params, state.config.options()) {
        Ok(options) => options,
        Err(message) => return failure(message),
    };

    tracing::info!("REST scan requested for {url}");
    let report = scan_with_registry(
        state.driver.as_ref(),
        &url,
        options,
        &state.config,
        &state.registry,
    )
    .await;

    if let Some(audit) = &state.audit {
        if let Err(e) = audit.lock().await.log_report(&report, "rest") {
            tracing::warn!("failed to write audit event: {e:#}");
        }
    }

    success(report)
}

async fn handle_fix(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let Some(violation_id) = params.get("violation_id") else {
        return failure("missing required parameter 'violation_id'");
    };
    let (snippet, _) = state.catalog.lookup(violation_id);
    success(snippet)
}

async fn handle_rules(State(state): State<Arc<AppState>>) -> Json<Value> {
    let rules: Vec<_> = state.registry.metas().collect();
    success(json!({ "catalog_version": CATALOG_VERSION, "rules": rules }))
}
