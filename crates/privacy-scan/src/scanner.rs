//! The scan pipeline.
//!
//! One scan owns one session from open to close:
//!
//! 1. attach the passive collector, then navigate with retry;
//! 2. capture entry evidence (markup, banners, anchors, scripts, storage);
//! 3. locate consent controls and run the interaction protocol;
//! 4. optionally screenshot, then follow the privacy link;
//! 5. read the final cookie jar.
//!
//! Steps 1-5 run under one umbrella timeout. Closing the session and
//! draining the passive log are bounded by a separate grace period; then the
//! bundle is frozen and the catalog evaluated. Only a failed entry load, a
//! missing browser, or the umbrella timeout degrade the report; everything
//! else becomes missing evidence.

use crate::config::{ScanConfig, ScanOptions};
use crate::consent::{locate_controls, simulate, InteractionDelays};
use crate::driver::{Driver, DriverSession, ElementInfo};
use crate::error::{ScanError, ScanResult};
use crate::evidence::{Anchor, ControlSummary, CookieSnapshots, EvidenceBundle, StorageKeys};
use crate::navigation::{navigate, RetryPolicy};
use crate::observe::{ObservationCollector, ObservationLog};
use crate::policy::{fetch_policy, locate_policy_link, PrivacyPolicy};
use crate::probes::{
    ANCHOR_SELECTOR, DIALOG_SELECTOR, FINGERPRINT_RUNTIME, INLINE_SCRIPTS, SCRIPT_SOURCES,
    STORAGE_KEYS,
};
use crate::report::{assemble, Report, ScanContext};
use crate::rules::RuleRegistry;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Scan `url` with the default rule catalog.
pub async fn scan(
    driver: &dyn Driver,
    url: &str,
    options: ScanOptions,
    config: &ScanConfig,
) -> Report {
    scan_with_registry(driver, url, options, config, &RuleRegistry::default_catalog()).await
}

/// Scan `url` and evaluate `registry` over the evidence.
///
/// Always returns a report. Failures that end the scan produce a degraded
/// report with the error set and a score of zero.
pub async fn scan_with_registry(
    driver: &dyn Driver,
    url: &str,
    options: ScanOptions,
    config: &ScanConfig,
    registry: &RuleRegistry,
) -> Report {
    let start = Instant::now();
    let config = config.with_options(options);
    tracing::info!("scanning {url}");

    let mut session = match driver.open_session().await {
        Ok(s) => s,
        Err(e) => {
            let err = ScanError::DriverUnavailable(format!("{e:#}"));
            tracing::error!("{err}");
            return finish_degraded(url, &err, start);
        }
    };

    let collector = match ObservationCollector::attach(session.as_ref()).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("passive observation unavailable: {e:#}");
            ObservationCollector::detached()
        }
    };

    let budget = Duration::from_millis(config.scan_budget_ms);
    let outcome = tokio::time::timeout(
        budget,
        run_pipeline(session.as_mut(), url, &config),
    )
    .await
    .unwrap_or(Err(ScanError::Timeout {
        budget_ms: config.scan_budget_ms,
    }));

    let grace = Duration::from_millis(config.close_grace_ms);
    close_session(session, grace).await;
    let observed = collector.finish(grace).await;

    match outcome {
        Ok(captured) => {
            let context = ScanContext {
                navigation_attempts: captured.navigation_attempts,
                screenshot: captured.screenshot,
                duration_ms: start.elapsed().as_millis() as u64,
            };
            let bundle = with_observations(captured.bundle, observed);
            let report = assemble(&bundle, registry, &config.weights, context);
            tracing::info!(
                "scan of {url} finished: score {} with {} violation(s) in {}ms",
                report.score,
                report.violations.len(),
                report.duration_ms
            );
            report
        }
        Err(err) => {
            tracing::error!("scan of {url} failed: {err}");
            finish_degraded(url, &err, start)
        }
    }
}

/// Close the session, giving up after `grace` so a browser that refuses to
/// exit cannot hold the scan open.
async fn close_session(session: Box<dyn DriverSession>, grace: Duration) {
    match tokio::time::timeout(grace, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("failed to close session: {e:#}"),
        Err(_) => tracing::warn!(
            "session did not close within {}ms, abandoning it",
            grace.as_millis()
        ),
    }
}

/// Fold the passive log into the page evidence. Script sources read from
/// the DOM come first.
fn with_observations(mut bundle: EvidenceBundle, observed: ObservationLog) -> EvidenceBundle {
    bundle.scripts = merge_unique(std::mem::take(&mut bundle.scripts), observed.scripts);
    bundle.requests = observed.requests;
    bundle.responses = observed.responses;
    bundle.console = observed.console;
    bundle
}

fn finish_degraded(url: &str, err: &ScanError, start: Instant) -> Report {
    let mut report = Report::degraded(url, err);
    report.duration_ms = start.elapsed().as_millis() as u64;
    report
}

/// Page evidence plus the run facts the report needs. The passive log is
/// folded in after the session closes.
struct Captured {
    bundle: EvidenceBundle,
    navigation_attempts: u32,
    screenshot: Option<String>,
}

async fn run_pipeline(
    session: &mut dyn DriverSession,
    url: &str,
    config: &ScanConfig,
) -> ScanResult<Captured> {
    let nav = navigate(session, url, &RetryPolicy::entry(config)).await?;

    // Entry evidence, read before any interaction changes the page.
    let markup = session.content().await.unwrap_or_else(|e| {
        tracing::warn!("failed to read page content: {e:#}");
        String::new()
    });
    let inline: Vec<String> = evaluate_or_default(session, INLINE_SCRIPTS, "inline scripts").await;
    let mut text = markup.to_lowercase();
    for script in &inline {
        text.push('\n');
        text.push_str(&script.to_lowercase());
    }

    let dialog_texts: Vec<String> = query_or_empty(session, DIALOG_SELECTOR)
        .await
        .into_iter()
        .map(|e| e.text.to_lowercase())
        .filter(|t| !t.trim().is_empty())
        .collect();
    let anchor_elements = query_or_empty(session, ANCHOR_SELECTOR).await;
    let script_sources: Vec<String> =
        evaluate_or_default(session, SCRIPT_SOURCES, "script sources").await;
    let storage: StorageKeys = evaluate_or_default(session, STORAGE_KEYS, "storage keys").await;
    let fingerprint_probe: bool =
        evaluate_or_default(session, FINGERPRINT_RUNTIME, "fingerprint probe").await;

    let controls = locate_controls(session).await;
    let run = simulate(
        session,
        &controls,
        InteractionDelays {
            after_reject: Duration::from_millis(config.reject_delay_ms),
            after_accept: Duration::from_millis(config.accept_delay_ms),
        },
    )
    .await;

    let screenshot = if config.save_screenshot {
        capture_screenshot(session, config, &nav.final_url).await
    } else {
        None
    };

    let policy = match locate_policy_link(&anchor_elements, &nav.final_url) {
        Some(link) => {
            tracing::info!("following privacy link {link}");
            let retry = RetryPolicy::single(config.policy_timeout_ms, config.policy_settle_ms);
            fetch_policy(session, &link, &retry).await
        }
        None => {
            tracing::info!("no privacy link on {}", nav.final_url);
            PrivacyPolicy::default()
        }
    };

    let final_cookies = session.cookies().await.unwrap_or_else(|e| {
        tracing::warn!("final cookie read failed: {e:#}");
        Vec::new()
    });

    let bundle = EvidenceBundle {
        requested_url: url.to_string(),
        final_url: nav.final_url.clone(),
        text,
        dialog_texts,
        anchors: anchor_elements.iter().map(Anchor::from).collect(),
        controls: ControlSummary::from(&controls),
        control_labels: controls.labels.iter().map(|l| l.to_lowercase()).collect(),
        scripts: script_sources,
        cookies: CookieSnapshots {
            initial: run.timeline.initial,
            post_reject_or_manage: run.timeline.post_reject_or_manage,
            post_accept: run.timeline.post_accept,
            final_cookies,
        },
        storage,
        fingerprint_probe,
        policy,
        interactions: run.interactions,
        ..EvidenceBundle::default()
    };

    Ok(Captured {
        bundle,
        navigation_attempts: nav.attempts,
        screenshot,
    })
}

async fn query_or_empty(session: &mut dyn DriverSession, selector: &str) -> Vec<ElementInfo> {
    session.query_elements(selector).await.unwrap_or_else(|e| {
        tracing::warn!("query {selector:?} failed: {e:#}");
        Vec::new()
    })
}

/// Evaluate `script` and decode its value. Any failure yields the default.
async fn evaluate_or_default<T>(session: &dyn DriverSession, script: &str, what: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match session.evaluate(script).await {
        Ok(value) if !value.is_null() => serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("unexpected {what} value: {e}");
            T::default()
        }),
        Ok(_) => T::default(),
        Err(e) => {
            tracing::warn!("failed to read {what}: {e:#}");
            T::default()
        }
    }
}

async fn capture_screenshot(
    session: &dyn DriverSession,
    config: &ScanConfig,
    final_url: &str,
) -> Option<String> {
    let path = screenshot_path(&config.screenshot_dir, final_url);
    if let Err(e) = tokio::fs::create_dir_all(&config.screenshot_dir).await {
        tracing::warn!(
            "cannot create screenshot dir {}: {e}",
            config.screenshot_dir.display()
        );
        return None;
    }
    match session.screenshot(&path).await {
        Ok(()) => Some(path.display().to_string()),
        Err(e) => {
            tracing::warn!("screenshot failed: {e:#}");
            None
        }
    }
}

/// `scan_<host>.png` under `dir`, with the host reduced to safe characters.
pub fn screenshot_path(dir: &std::path::Path, url: &str) -> PathBuf {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "page".to_string());
    let safe: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("scan_{safe}.png"))
}

fn merge_unique(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
