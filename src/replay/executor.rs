use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::resolver::Resolver;
use super::script::scroll_script;
use super::scoring::Resolution;
use crate::browser::BrowserControl;
use crate::error::RecorderError;
use crate::models::{Action, ActionKind, StepReport};

/// Executes stored actions one at a time, each bounded by a timeout
pub struct ReplayRunner {
    resolver: Resolver,
    step_timeout: Duration,
}

impl ReplayRunner {
    pub fn new(resolver: Resolver, step_timeout: Duration) -> Self {
        Self {
            resolver,
            step_timeout,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Runs one action. There is no retry here; a failure is the caller's to handle.
    pub async fn execute(
        &self,
        browser: &dyn BrowserControl,
        action: &Action,
    ) -> Result<Option<Resolution>, RecorderError> {
        action.validate().map_err(RecorderError::InvalidAction)?;
        info!("Replaying step #{}: {}", action.sequence_index, action.describe());

        let budget = self.budget(action);
        match tokio::time::timeout(budget, self.dispatch(browser, action)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Step #{} exceeded {}ms", action.sequence_index, budget.as_millis());
                Err(RecorderError::ActionTimeout {
                    sequence_index: action.sequence_index,
                    timeout_ms: budget.as_millis() as u64,
                })
            }
        }
    }

    /// A `wait` step gets its own duration on top of the step timeout
    fn budget(&self, action: &Action) -> Duration {
        match action.kind {
            ActionKind::Wait => self.step_timeout + Duration::from_millis(action.wait_ms().unwrap_or_default()),
            _ => self.step_timeout,
        }
    }

    async fn dispatch(
        &self,
        browser: &dyn BrowserControl,
        action: &Action,
    ) -> Result<Option<Resolution>, RecorderError> {
        let missing_target = || RecorderError::InvalidAction(format!("action #{} has no target", action.sequence_index));

        match action.kind {
            ActionKind::Click => {
                let target = action.target.as_ref().ok_or_else(missing_target)?;
                self.resolver.click(browser, target).await.map(Some)
            }
            ActionKind::Type => {
                let target = action.target.as_ref().ok_or_else(missing_target)?;
                self.resolver
                    .type_text(browser, target, action.payload_str())
                    .await
                    .map(Some)
            }
            ActionKind::Press => {
                self.resolver
                    .press(browser, action.payload_str(), action.target.as_ref())
                    .await
            }
            ActionKind::GoTo => {
                browser.navigate(action.payload_str()).await?;
                self.resolver.wait_until_ready(browser).await?;
                Ok(None)
            }
            ActionKind::Scroll => {
                let (x, y) = action.scroll_offset().unwrap_or_default();
                browser.evaluate(&scroll_script(x, y)).await?;
                Ok(None)
            }
            ActionKind::Wait => {
                tokio::time::sleep(Duration::from_millis(action.wait_ms().unwrap_or_default())).await;
                Ok(None)
            }
        }
    }

    /// Builds the report for a finished step
    pub fn report(
        action: &Action,
        result: &Result<Option<Resolution>, RecorderError>,
        started: Instant,
    ) -> StepReport {
        let duration_ms = started.elapsed().as_millis() as u64;
        let mut report = match result {
            Ok(resolution) => {
                let mut report = StepReport::success(action.sequence_index, action.kind, duration_ms);
                if let Some(resolution) = resolution {
                    report.score = Some(resolution.score);
                    report.matched = Some(resolution.candidate.summary());
                }
                report
            }
            Err(e) => {
                let mut report = StepReport::failure(action.sequence_index, action.kind, e.to_string());
                report.duration_ms = duration_ms;
                report
            }
        };
        report.target = action.target.clone();
        report
    }
}
