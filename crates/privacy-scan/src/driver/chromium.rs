//! Chromium-backed driver using chromiumoxide.
//!
//! Every session launches its own headless browser so cookie jars never
//! leak between scans.

use super::{
    CookieRecord, Driver, DriverSession, ElementInfo, ElementRef, NavigationResult,
    NavigationTimeout, PageEvent,
};
use crate::config::BrowserConfig as LaunchConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    self, CookieSameSite, EventRequestWillBeSent, EventResponseReceived, ResourceType,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// How long a closing browser gets to exit before it is killed.
const BROWSER_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. PRIVACY_SCAN_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PRIVACY_SCAN_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.privacy-scan/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".privacy-scan/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".privacy-scan/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".privacy-scan/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".privacy-scan/chromium/chrome-linux64/chrome"),
                home.join(".privacy-scan/chromium/chrome"),
            ]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 3. System PATH
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| {
            let common =
                PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
            (cfg!(target_os = "macos") && common.exists()).then_some(common)
        })
}

/// Launches one headless Chromium per session.
pub struct ChromiumDriver {
    config: LaunchConfig,
}

impl ChromiumDriver {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    /// Launch a browser and open its single page.
    pub async fn launch(&self) -> Result<ChromiumSession> {
        let chrome_path = match &self.config.chromium_path {
            Some(p) => p.clone(),
            None => find_chromium().context("Chromium not found")?,
        };

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(self.config.window_width, self.config.window_height)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--ignore-certificate-errors")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .context("failed to set user agent")?;
        page.execute(network::EnableParams::default())
            .await
            .context("failed to enable network domain")?;

        tracing::debug!("chromium session opened");

        Ok(ChromiumSession {
            browser,
            page,
            handler_task,
            elements: Vec::new(),
        })
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    async fn open_session(&self) -> Result<Box<dyn DriverSession>> {
        Ok(Box::new(self.launch().await?))
    }
}

/// A single Chromium page plus the browser that owns it.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    /// Elements handed out by `query_elements`, indexed by `ElementRef`.
    elements: Vec<Element>,
}

#[async_trait]
impl DriverSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                // Old handles point into the previous document.
                self.elements.clear();
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(CdpError::Timeout)) => Err(NavigationTimeout { timeout_ms }.into()),
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => Err(NavigationTimeout { timeout_ms }.into()),
        }
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.context("failed to read page content")
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        // Page-level reads only cover the current document's URLs; the
        // browser-level jar also holds third-party and earlier-host cookies.
        let cookies = self
            .browser
            .get_cookies()
            .await
            .context("failed to read cookies")?;

        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
                same_site: c.same_site.map(|s| match s {
                    CookieSameSite::Strict => "Strict".to_string(),
                    CookieSameSite::Lax => "Lax".to_string(),
                    CookieSameSite::None => "None".to_string(),
                }),
                session: c.session,
                expires: c.expires,
            })
            .collect())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn query_elements(&mut self, selector: &str) -> Result<Vec<ElementInfo>> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("query failed for selector {selector}"))?;

        let mut infos = Vec::with_capacity(found.len());
        for element in found {
            let tag = element
                .property("tagName")
                .await
                .ok()
                .flatten()
                .and_then(|v| v.as_str().map(str::to_ascii_lowercase))
                .unwrap_or_default();
            let mut text = element.inner_text().await.ok().flatten().unwrap_or_default();
            if text.trim().is_empty() && tag == "input" {
                text = element
                    .attribute("value")
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default();
            }
            let href = element.attribute("href").await.ok().flatten();

            let handle = ElementRef(self.elements.len());
            self.elements.push(element);
            infos.push(ElementInfo {
                handle,
                tag,
                text: text.trim().to_string(),
                href,
            });
        }
        Ok(infos)
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        let Some(el) = self.elements.get(element.0) else {
            bail!("unknown element handle {}", element.0);
        };
        el.click().await.context("click failed")?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .with_context(|| format!("failed to save screenshot to {}", path.display()))?;
        Ok(())
    }

    async fn events(&self) -> Result<BoxStream<'static, PageEvent>> {
        let requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to subscribe to requests")?
            .map(|ev| PageEvent::Request {
                url: ev.request.url.clone(),
                is_script: matches!(ev.r#type, Some(ResourceType::Script)),
            });

        let responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to responses")?
            .map(|ev| PageEvent::Response {
                url: ev.response.url.clone(),
                status: u16::try_from(ev.response.status).unwrap_or_default(),
            });

        let console = self
            .page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .context("failed to subscribe to console")?
            .map(|ev| PageEvent::Console {
                level: format!("{:?}", ev.r#type).to_ascii_lowercase(),
                text: ev
                    .args
                    .iter()
                    .map(|arg| match (&arg.value, &arg.description) {
                        (Some(serde_json::Value::String(s)), _) => s.clone(),
                        (Some(v), _) => v.to_string(),
                        (None, Some(d)) => d.clone(),
                        (None, None) => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            });

        Ok(futures::stream::select_all([
            requests.boxed(),
            responses.boxed(),
            console.boxed(),
        ])
        .boxed())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
            ..
        } = *self;
        let shutdown = async {
            let _ = page.close().await;
            let _ = browser.close().await;
            let _ = browser.wait().await;
        };
        let exited = tokio::time::timeout(BROWSER_EXIT_GRACE, shutdown).await.is_ok();
        if !exited {
            tracing::warn!(
                "chromium did not exit within {}s, killing it",
                BROWSER_EXIT_GRACE.as_secs()
            );
            let _ = browser.kill().await;
        }
        handler_task.abort();
        tracing::debug!("chromium session closed");
        Ok(())
    }
}
