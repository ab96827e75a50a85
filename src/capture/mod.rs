//! Event capture: keeps the instrumentation installed across navigations and
//! drains its queue on an adaptive schedule.

mod script;

pub use script::{pause_script, stamp_script, DRAIN_SCRIPT, INSTRUMENTATION_SCRIPT, TEARDOWN_SCRIPT};

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::{decode, BrowserControl};
use crate::error::RecorderError;
use crate::models::{EventKind, RawEvent};

/// Short intervals right after a document is (re)instrumented, longer ones after
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSchedule {
    pub burst_interval: Duration,
    pub steady_interval: Duration,
    /// Number of polls that use `burst_interval`
    pub burst_polls: u32,
}

impl PollSchedule {
    pub fn interval_after(&self, polls_since_init: u32) -> Duration {
        if polls_since_init < self.burst_polls {
            self.burst_interval
        } else {
            self.steady_interval
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            burst_interval: Duration::from_millis(50),
            steady_interval: Duration::from_millis(250),
            burst_polls: 10,
        }
    }
}

/// Bounded retry for installing the instrumentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectionRetry {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl InjectionRetry {
    /// Linear backoff: the n-th failed attempt waits n * backoff
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for InjectionRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Drained {
    present: bool,
    #[serde(default)]
    epoch: Option<u64>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    events: Vec<Value>,
}

/// Holds scheduling bookkeeping and events in transit; the navigation epoch is owned
/// by the caller and passed into every poll.
pub struct EventCapture {
    schedule: PollSchedule,
    retry: InjectionRetry,
    polls_since_init: u32,
    /// Epoch announced for a document that is not stamped yet
    unstamped: Option<u64>,
    failed_injections: u32,
    /// Drained events not yet handed to the caller
    drained: Vec<RawEvent>,
}

impl EventCapture {
    pub fn new(schedule: PollSchedule, retry: InjectionRetry) -> Self {
        Self {
            schedule,
            retry,
            polls_since_init: 0,
            unstamped: None,
            failed_injections: 0,
            drained: Vec::new(),
        }
    }

    /// Registers the script for future documents and installs it in the current one
    pub async fn install(&mut self, browser: &dyn BrowserControl, epoch: u64) -> Result<(), RecorderError> {
        let mut last_error = String::new();

        for attempt in 1..=self.retry.max_attempts {
            match Self::inject(browser, epoch, true).await {
                Ok(()) => {
                    info!("Instrumentation installed (epoch {})", epoch);
                    self.polls_since_init = 0;
                    self.unstamped = None;
                    self.failed_injections = 0;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Injection attempt {}/{} failed: {}", attempt, self.retry.max_attempts, e);
                    last_error = e.to_string();
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(RecorderError::InjectionFailure {
            attempts: self.retry.max_attempts,
            message: last_error,
        })
    }

    async fn inject(browser: &dyn BrowserControl, epoch: u64, register: bool) -> anyhow::Result<()> {
        if register {
            browser.add_init_script(INSTRUMENTATION_SCRIPT).await?;
        }
        browser.evaluate(INSTRUMENTATION_SCRIPT).await?;
        let stamped = browser.evaluate(&stamp_script(epoch)).await?;
        if stamped != Value::Bool(true) {
            anyhow::bail!("instrumentation missing after injection");
        }
        Ok(())
    }

    /// Drains the page queue.
    ///
    /// A document that lost the instrumentation or carries another epoch is a
    /// new document: a `navigation` event with `epoch + 1` is emitted ahead of
    /// its events and the document is stamped (reinstalling if needed). Only
    /// repeated reinstall failures are returned as errors.
    ///
    /// Events taken from the page are held until returned, so a poll dropped
    /// while stamping hands them to the next call.
    pub async fn poll(&mut self, browser: &dyn BrowserControl, epoch: u64) -> Result<Vec<RawEvent>, RecorderError> {
        self.polls_since_init = self.polls_since_init.saturating_add(1);

        let drained = match browser.evaluate(DRAIN_SCRIPT).await {
            Ok(value) => match decode::<Drained>(&value) {
                Some(d) => d,
                None => {
                    debug!("Unreadable drain result: {}", value);
                    return Ok(std::mem::take(&mut self.drained));
                }
            },
            Err(e) => {
                // Mid-navigation the execution context is gone; the next tick sees the new document
                debug!("Poll skipped: {}", e);
                return Ok(std::mem::take(&mut self.drained));
            }
        };

        let new_document = !drained.present || drained.epoch != Some(epoch);
        let mut current = epoch;

        if new_document {
            current = match self.unstamped {
                Some(announced) if announced == epoch => announced,
                _ => {
                    let next = epoch + 1;
                    info!("Navigation detected: {} (epoch {} -> {})", drained.url, epoch, next);
                    self.drained.push(
                        RawEvent::new(EventKind::Navigation, now_millis())
                            .with_url(drained.url.clone())
                            .with_epoch(next),
                    );
                    self.unstamped = Some(next);
                    self.polls_since_init = 0;
                    next
                }
            };
        }

        for raw in drained.events {
            match serde_json::from_value::<RawEvent>(raw) {
                Ok(mut event) => {
                    event.epoch.get_or_insert(current);
                    self.drained.push(event);
                }
                Err(e) => debug!("Dropping malformed event: {}", e),
            }
        }

        if new_document {
            match Self::inject(browser, current, false).await {
                Ok(()) => {
                    debug!("Document stamped with epoch {}", current);
                    self.unstamped = None;
                    self.failed_injections = 0;
                }
                Err(e) => {
                    self.failed_injections += 1;
                    warn!(
                        "Reinjection failed ({}/{}): {}",
                        self.failed_injections, self.retry.max_attempts, e
                    );
                    if self.failed_injections >= self.retry.max_attempts {
                        return Err(RecorderError::InjectionFailure {
                            attempts: self.failed_injections,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(std::mem::take(&mut self.drained))
    }

    pub fn next_interval(&self) -> Duration {
        self.schedule.interval_after(self.polls_since_init)
    }

    /// Suspends or resumes queueing in the page. Best effort.
    pub async fn set_paused(&self, browser: &dyn BrowserControl, paused: bool) {
        if let Err(e) = browser.evaluate(&pause_script(paused)).await {
            debug!("Could not toggle page pause: {}", e);
        }
    }

    /// Removes listeners from the current document. Best effort.
    pub async fn teardown(&self, browser: &dyn BrowserControl) {
        if let Err(e) = browser.evaluate(TEARDOWN_SCRIPT).await {
            debug!("Teardown skipped: {}", e);
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
