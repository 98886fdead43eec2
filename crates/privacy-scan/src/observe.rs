//! Passive observation of page activity.
//!
//! The collector subscribes to the session's event stream before the entry
//! navigation and appends every event from a background task for as long as
//! the session lives. The foreground pipeline only ever takes copies.

use crate::driver::{DriverSession, PageEvent};
use anyhow::Result;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Request URLs kept in the reported sample.
pub const REQUEST_SAMPLE: usize = 200;
/// Script sources kept in the reported sample.
pub const SCRIPT_SAMPLE: usize = 200;
/// Console lines kept in the reported sample.
pub const CONSOLE_SAMPLE: usize = 50;
/// Response statuses kept in the reported sample.
pub const RESPONSE_SAMPLE: usize = 200;

/// Status of one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub url: String,
    pub status: u16,
}

/// Everything seen on the passive streams, in receipt order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationLog {
    /// Unique request URLs in first-seen order.
    pub requests: Vec<String>,
    /// Unique script-resource URLs in first-seen order.
    pub scripts: Vec<String>,
    pub responses: Vec<ResponseStatus>,
    /// `"<level>: <text>"` lines.
    pub console: Vec<String>,
    #[serde(skip)]
    seen_requests: HashSet<String>,
    #[serde(skip)]
    seen_scripts: HashSet<String>,
}

impl ObservationLog {
    /// Append one event.
    pub fn record(&mut self, event: PageEvent) {
        match event {
            PageEvent::Request { url, is_script } => {
                if is_script && self.seen_scripts.insert(url.clone()) {
                    self.scripts.push(url.clone());
                }
                if self.seen_requests.insert(url.clone()) {
                    self.requests.push(url);
                }
            }
            PageEvent::Response { url, status } => {
                self.responses.push(ResponseStatus { url, status });
            }
            PageEvent::Console { level, text } => {
                self.console.push(format!("{level}: {text}"));
            }
        }
    }

    pub fn request_sample(&self) -> Vec<String> {
        self.requests.iter().take(REQUEST_SAMPLE).cloned().collect()
    }

    pub fn script_sample(&self) -> Vec<String> {
        self.scripts.iter().take(SCRIPT_SAMPLE).cloned().collect()
    }

    pub fn console_sample(&self) -> Vec<String> {
        self.console.iter().take(CONSOLE_SAMPLE).cloned().collect()
    }

    pub fn response_sample(&self) -> Vec<ResponseStatus> {
        self.responses.iter().take(RESPONSE_SAMPLE).cloned().collect()
    }
}

/// Background subscriber feeding an [`ObservationLog`].
pub struct ObservationCollector {
    log: Arc<Mutex<ObservationLog>>,
    task: Option<JoinHandle<()>>,
}

impl ObservationCollector {
    /// Subscribe to `session` and start collecting.
    pub async fn attach(session: &dyn DriverSession) -> Result<Self> {
        Ok(Self::from_stream(session.events().await?))
    }

    /// Start collecting from an already-open event stream.
    pub fn from_stream(mut events: BoxStream<'static, PageEvent>) -> Self {
        let log = Arc::new(Mutex::new(ObservationLog::default()));
        let sink = Arc::clone(&log);

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                sink.lock().await.record(event);
            }
        });

        Self {
            log,
            task: Some(task),
        }
    }

    /// A collector that never receives anything. Used when subscription
    /// fails so the scan can continue without passive evidence.
    pub fn detached() -> Self {
        Self {
            log: Arc::new(Mutex::new(ObservationLog::default())),
            task: None,
        }
    }

    /// Copy of everything collected so far.
    pub async fn snapshot(&self) -> ObservationLog {
        self.log.lock().await.clone()
    }

    /// Stop collecting and return the final log.
    ///
    /// Waits up to `grace` for the stream to end, which happens once the
    /// session is closed and queued events are drained. A stream still open
    /// after that is cut off.
    pub async fn finish(mut self, grace: Duration) -> ObservationLog {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                tracing::debug!(
                    "event stream still open after {}ms, stopping collector",
                    grace.as_millis()
                );
                task.abort();
            }
        }
        self.log.lock().await.clone()
    }
}

impl Drop for ObservationCollector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
