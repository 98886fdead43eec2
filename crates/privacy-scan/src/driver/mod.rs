//! Driver abstraction for browser-based page automation.
//!
//! Defines the `Driver` and `DriverSession` traits the scan pipeline depends
//! on. The pipeline never touches a concrete browser; the only production
//! implementation is Chromium via chromiumoxide.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A navigation that did not finish within its timeout.
///
/// Drivers return this (inside `anyhow::Error`) so callers can tell a slow
/// page from a transport failure without reading the message.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("navigation timed out after {timeout_ms}ms")]
pub struct NavigationTimeout {
    pub timeout_ms: u64,
}

/// Opaque handle to an element returned by [`DriverSession::query_elements`].
///
/// Handles are only meaningful inside the session that produced them and
/// may go stale once the DOM changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub usize);

/// An element matched by a selector query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInfo {
    pub handle: ElementRef,
    /// Lowercase tag name.
    pub tag: String,
    /// Visible text (or `value` for input controls).
    pub text: String,
    pub href: Option<String>,
}

/// A cookie as read from the session's cookie jar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// `Strict`, `Lax`, `None`, or absent.
    pub same_site: Option<String>,
    /// Session cookies expire with the browser; everything else is persistent.
    pub session: bool,
    /// Expiry as seconds since the epoch, `-1` for session cookies.
    pub expires: f64,
}

impl CookieRecord {
    pub fn is_persistent(&self) -> bool {
        !self.session
    }
}

/// Passive activity observed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    /// An outbound request. `is_script` is set for script resources.
    Request { url: String, is_script: bool },
    /// A response status for a request.
    Response { url: String, status: u16 },
    /// A console message.
    Console { level: String, text: String },
}

/// A browser engine that can open isolated sessions.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new isolated session (own cookie jar, own page).
    async fn open_session(&self) -> Result<Box<dyn DriverSession>>;
}

/// A single controlled browser page.
#[async_trait]
pub trait DriverSession: Send + Sync {
    /// Navigate to a URL with a timeout. An overrun is reported as
    /// [`NavigationTimeout`].
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Full document markup of the current page.
    async fn content(&self) -> Result<String>;
    /// Current URL.
    async fn current_url(&self) -> Result<String>;
    /// Every cookie in the session's jar, across all domains.
    async fn cookies(&self) -> Result<Vec<CookieRecord>>;
    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Query elements by CSS selector, in document order.
    async fn query_elements(&mut self, selector: &str) -> Result<Vec<ElementInfo>>;
    /// Click a previously queried element.
    async fn click(&mut self, element: ElementRef) -> Result<()>;
    /// Capture a full-page screenshot to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;
    /// Subscribe to passive request/response/console activity.
    ///
    /// Each call returns an independent stream; events arrive in the order
    /// the browser delivered them.
    async fn events(&self) -> Result<BoxStream<'static, PageEvent>>;
    /// Close the session and release the browser.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A driver used when no browser is available. Every session open fails.
pub struct NoopDriver;

#[async_trait]
impl Driver for NoopDriver {
    async fn open_session(&self) -> Result<Box<dyn DriverSession>> {
        Err(anyhow::anyhow!("browser not available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_driver_refuses_sessions() {
        assert!(NoopDriver.open_session().await.is_err());
    }

    #[test]
    fn test_page_event_serialization() {
        let ev = PageEvent::Response {
            url: "https://example.com/".to_string(),
            status: 204,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"response\""));
        let parsed: PageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ev);
    }

    #[test]
    fn test_cookie_persistence() {
        let mut c = CookieRecord {
            name: "_ga".to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            same_site: Some("Lax".to_string()),
            session: false,
            expires: 1_900_000_000.0,
        };
        assert!(c.is_persistent());
        c.session = true;
        assert!(!c.is_persistent());
    }
}
