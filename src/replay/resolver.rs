use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::script::{cursor_script, focus_script, locate_script, prepare_field_script, SCAN_SCRIPT};
use super::scoring::{DomCandidate, Rect, Resolution, ScoreTable};
use crate::browser::{decode, BrowserControl, ReadyState};
use crate::error::RecorderError;
use crate::models::{Position, TargetDescriptor};

const READY_POLL: Duration = Duration::from_millis(100);

/// Re-locates recorded targets in the live page and acts on them.
///
/// Holds no page state between calls; every resolution starts from a fresh scan.
pub struct Resolver {
    table: ScoreTable,
    ready_timeout: Duration,
    cursor_travel: Duration,
}

impl Resolver {
    pub fn new(table: ScoreTable, ready_timeout: Duration, cursor_travel: Duration) -> Self {
        Self {
            table,
            ready_timeout,
            cursor_travel,
        }
    }

    pub async fn wait_until_ready(&self, browser: &dyn BrowserControl) -> Result<(), RecorderError> {
        let started = Instant::now();
        loop {
            match browser.ready_state().await {
                Ok(ReadyState::Complete) => return Ok(()),
                Ok(state) => debug!("Waiting for page, readyState {:?}", state),
                // The context is torn down while a navigation commits
                Err(e) => debug!("readyState unavailable: {}", e),
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(RecorderError::PageNotReady {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    /// Scans the page and picks the best candidate for `target`
    pub async fn resolve(
        &self,
        browser: &dyn BrowserControl,
        target: &TargetDescriptor,
    ) -> Result<Resolution, RecorderError> {
        self.wait_until_ready(browser).await?;

        let scanned = browser.evaluate(SCAN_SCRIPT).await?;
        let candidates: Vec<DomCandidate> = decode(&scanned).unwrap_or_default();
        debug!("Scanned {} candidates for {}", candidates.len(), target);

        match self.table.select(target, &candidates) {
            Ok(resolution) => {
                info!(
                    "Resolved {} -> {} (score {}, {} matched)",
                    target,
                    resolution.candidate.summary(),
                    resolution.score,
                    resolution.considered.len()
                );
                Ok(resolution)
            }
            Err(unresolved) => {
                warn!("{}", unresolved);
                Err(RecorderError::not_found(unresolved))
            }
        }
    }

    pub async fn click(
        &self,
        browser: &dyn BrowserControl,
        target: &TargetDescriptor,
    ) -> Result<Resolution, RecorderError> {
        let resolution = self.resolve(browser, target).await?;
        let point = self.point_at(browser, &resolution).await?;
        browser.click_at(point).await?;
        Ok(resolution)
    }

    /// Focuses the field, clears it and inserts `text` (selects the option for `<select>`)
    pub async fn type_text(
        &self,
        browser: &dyn BrowserControl,
        target: &TargetDescriptor,
        text: &str,
    ) -> Result<Resolution, RecorderError> {
        let resolution = self.resolve(browser, target).await?;
        let point = self.point_at(browser, &resolution).await?;
        browser.click_at(point).await?;

        let prepared = browser
            .evaluate(&prepare_field_script(resolution.candidate.dom_index, text))
            .await?;
        match prepared.as_str() {
            Some("selected") => {}
            Some("missing") => {
                warn!("Field {} disappeared before typing", resolution.candidate.summary());
                return Err(RecorderError::not_found(super::Unresolved {
                    target: target.clone(),
                    considered: resolution.considered,
                }));
            }
            _ => browser.insert_text(text).await?,
        }
        Ok(resolution)
    }

    /// Presses a key, first focusing `target` when one is given
    pub async fn press(
        &self,
        browser: &dyn BrowserControl,
        key: &str,
        target: Option<&TargetDescriptor>,
    ) -> Result<Option<Resolution>, RecorderError> {
        let resolution = match target {
            Some(target) => {
                let resolution = self.resolve(browser, target).await?;
                self.point_at(browser, &resolution).await?;
                browser
                    .evaluate(&focus_script(resolution.candidate.dom_index))
                    .await?;
                Some(resolution)
            }
            None => None,
        };
        browser.press_key(key).await?;
        debug!("Pressed {}", key);
        Ok(resolution)
    }

    /// Brings the element into view and glides the cursor to its center
    async fn point_at(&self, browser: &dyn BrowserControl, resolution: &Resolution) -> Result<Position, RecorderError> {
        let located = browser
            .evaluate(&locate_script(resolution.candidate.dom_index))
            .await?;
        let rect: Rect = decode(&located).unwrap_or(resolution.candidate.rect);
        let center = rect.center();

        let travel_ms = self.cursor_travel.as_millis() as u64;
        if let Err(e) = browser.evaluate(&cursor_script(center.x, center.y, travel_ms)).await {
            debug!("Cursor overlay unavailable: {}", e);
        }
        browser.move_mouse(center).await?;
        if !self.cursor_travel.is_zero() {
            tokio::time::sleep(self.cursor_travel).await;
        }
        Ok(center)
    }
}
