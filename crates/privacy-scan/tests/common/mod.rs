//! Scripted in-memory driver for pipeline tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use privacy_scan::driver::{
    CookieRecord, Driver, DriverSession, ElementInfo, ElementRef, NavigationResult, PageEvent,
};
use privacy_scan::probes::{
    ANCHOR_SELECTOR, CONTROL_SELECTOR, DIALOG_SELECTOR, FINGERPRINT_RUNTIME, INLINE_SCRIPTS,
    SCRIPT_SOURCES, STORAGE_KEYS,
};
use privacy_scan::ScanConfig;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;

const CONTROL_BASE: usize = 100;

pub fn cookie(name: &str, persistent: bool) -> CookieRecord {
    CookieRecord {
        name: name.to_string(),
        domain: ".shop.test".to_string(),
        path: "/".to_string(),
        secure: true,
        http_only: true,
        same_site: Some("Lax".to_string()),
        session: !persistent,
        expires: if persistent { 1_900_000_000.0 } else { -1.0 },
    }
}

/// What the fake site serves.
#[derive(Clone, Default)]
pub struct FakeSite {
    pub html: String,
    pub dialogs: Vec<String>,
    /// `(text, href)` pairs.
    pub anchors: Vec<(String, String)>,
    pub controls: Vec<String>,
    pub scripts: Vec<String>,
    pub storage: Value,
    pub fingerprint: bool,
    pub initial_cookies: Vec<CookieRecord>,
    pub after_reject: Vec<CookieRecord>,
    pub after_accept: Vec<CookieRecord>,
    /// Served for any URL containing `/privacy`; `None` refuses the connection.
    pub policy_html: Option<String>,
    /// Entry navigations that fail before one succeeds.
    pub entry_failures: u32,
    /// Entry navigation never completes.
    pub hang: bool,
    /// `close` never completes.
    pub close_hangs: bool,
    /// Control labels whose clicks fail as stale.
    pub stale_controls: Vec<String>,
    pub events: Vec<PageEvent>,
}

/// Shared record of what the pipeline did.
#[derive(Clone, Default)]
pub struct Trace {
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Trace {
    fn push(&self, call: impl Into<String>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.into());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeDriver {
    pub site: FakeSite,
    pub trace: Trace,
}

impl FakeDriver {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site,
            trace: Trace::default(),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open_session(&self) -> Result<Box<dyn DriverSession>> {
        self.trace.push("open");
        Ok(Box::new(FakeSession {
            site: self.site.clone(),
            trace: self.trace.clone(),
            jar: self.site.initial_cookies.clone(),
            on_policy: false,
            entry_attempts: 0,
        }))
    }
}

struct FakeSession {
    site: FakeSite,
    trace: Trace,
    jar: Vec<CookieRecord>,
    on_policy: bool,
    entry_attempts: u32,
}

#[async_trait]
impl DriverSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.trace.push(format!("navigate:{url}"));
        tokio::task::yield_now().await;

        if url.contains("/privacy") {
            if self.site.policy_html.is_none() {
                bail!("net::ERR_CONNECTION_REFUSED");
            }
            self.on_policy = true;
        } else {
            if self.site.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.entry_attempts += 1;
            if self.entry_attempts <= self.site.entry_failures {
                bail!("net::ERR_CONNECTION_RESET");
            }
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn content(&self) -> Result<String> {
        if self.on_policy {
            return Ok(self.site.policy_html.clone().unwrap_or_default());
        }
        Ok(self.site.html.clone())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        self.trace.push("cookies");
        Ok(self.jar.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        Ok(match script {
            s if s == SCRIPT_SOURCES => json!(self.site.scripts),
            s if s == INLINE_SCRIPTS => json!([]),
            s if s == STORAGE_KEYS => self.site.storage.clone(),
            s if s == FINGERPRINT_RUNTIME => json!(self.site.fingerprint),
            _ => Value::Null,
        })
    }

    async fn query_elements(&mut self, selector: &str) -> Result<Vec<ElementInfo>> {
        let element = |i: usize, tag: &str, text: &str, href: Option<&str>| ElementInfo {
            handle: ElementRef(i),
            tag: tag.to_string(),
            text: text.to_string(),
            href: href.map(String::from),
        };
        Ok(match selector {
            s if s == DIALOG_SELECTOR => self
                .site
                .dialogs
                .iter()
                .enumerate()
                .map(|(i, t)| element(i, "div", t, None))
                .collect(),
            s if s == ANCHOR_SELECTOR => self
                .site
                .anchors
                .iter()
                .enumerate()
                .map(|(i, (t, h))| element(i, "a", t, Some(h)))
                .collect(),
            s if s == CONTROL_SELECTOR => self
                .site
                .controls
                .iter()
                .enumerate()
                .map(|(i, t)| element(CONTROL_BASE + i, "button", t, None))
                .collect(),
            _ => Vec::new(),
        })
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        let Some(label) = element
            .0
            .checked_sub(CONTROL_BASE)
            .and_then(|i| self.site.controls.get(i))
            .cloned()
        else {
            bail!("stale element");
        };
        if self.site.stale_controls.contains(&label) {
            bail!("stale element");
        }
        self.trace.push(format!("click:{label}"));

        let lower = label.to_lowercase();
        if lower.contains("reject") || lower.contains("manage") {
            self.jar = self.site.after_reject.clone();
        } else if lower.contains("accept") {
            self.jar = self.site.after_accept.clone();
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, b"png").await?;
        Ok(())
    }

    async fn events(&self) -> Result<BoxStream<'static, PageEvent>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        for event in &self.site.events {
            let _ = tx.send(event.clone());
        }
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.trace.push("close");
        if self.site.close_hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.trace.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Config with every pause removed.
pub fn quick_config() -> ScanConfig {
    ScanConfig {
        timeout_ms: 1_000,
        max_attempts: 2,
        retry_backoff_ms: 0,
        settle_delay_ms: 0,
        reject_delay_ms: 0,
        accept_delay_ms: 0,
        policy_timeout_ms: 1_000,
        policy_settle_ms: 0,
        scan_budget_ms: 5_000,
        close_grace_ms: 200,
        ..ScanConfig::default()
    }
}

/// A shop with a banner, both consent buttons and a complete policy.
pub fn compliant_shop() -> FakeSite {
    FakeSite {
        html: "<html><body><div role=\"dialog\">We use cookies. Reject or accept them.</div>\
               <main>Welcome to the shop</main><footer>Privacy settings, withdraw consent, \
               delete my data.</footer></body></html>"
            .to_string(),
        dialogs: vec!["We use cookies. Reject or accept them.".to_string()],
        anchors: vec![
            ("Privacy Policy".to_string(), "/privacy".to_string()),
            (
                "Do Not Sell My Personal Information".to_string(),
                "/do-not-sell".to_string(),
            ),
        ],
        controls: vec!["Reject all".to_string(), "Accept".to_string()],
        scripts: vec!["https://shop.test/static/app.js".to_string()],
        storage: json!({ "localStorage": [], "sessionStorage": [] }),
        initial_cookies: vec![cookie("session_id", false)],
        after_reject: vec![cookie("session_id", false)],
        after_accept: vec![cookie("session_id", false), cookie("prefs", false)],
        policy_html: Some(
            "<h1>Privacy</h1> Retention: 12 months. Third-party processors. \
             Right to be forgotten. Right of access. Do not sell."
                .to_string(),
        ),
        events: vec![
            PageEvent::Request {
                url: "https://shop.test/".to_string(),
                is_script: false,
            },
            PageEvent::Request {
                url: "https://shop.test/static/app.js".to_string(),
                is_script: true,
            },
            PageEvent::Response {
                url: "https://shop.test/".to_string(),
                status: 200,
            },
        ],
        ..FakeSite::default()
    }
}
