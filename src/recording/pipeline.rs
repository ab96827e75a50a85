//! The two session pipelines: capture -> accumulate -> store (write mode) and
//! store -> resolve -> browser (read mode), behind one interface the recorder drives.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::accumulator::{Accumulator, AccumulatorSettings};
use super::classify::SubmitClassifier;
use super::recorder::CommandKind;
use crate::browser::BrowserControl;
use crate::capture::EventCapture;
use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::events::EventSink;
use crate::models::{
    Action, ActionKind, ActionScript, RawEvent, RecorderMode, SessionStatus, StepReport, Strategy, TargetDescriptor,
};
use crate::replay::{ReplayRunner, Resolution, Resolver, ScoreTable};
use crate::store::ActionStore;

/// Everything needed to build a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: RecorderMode,
    pub name: String,
    pub start_url: Option<String>,
    /// Action list to replay (read mode)
    pub script_path: Option<PathBuf>,
    /// Where the action list is written (write mode)
    pub output_path: Option<PathBuf>,
    pub config: RecorderConfig,
}

impl SessionOptions {
    pub fn write(name: impl Into<String>, start_url: Option<String>, config: RecorderConfig) -> Self {
        Self {
            mode: RecorderMode::Write,
            name: name.into(),
            start_url,
            script_path: None,
            output_path: None,
            config,
        }
    }

    pub fn read(script_path: impl Into<PathBuf>, config: RecorderConfig) -> Self {
        Self {
            mode: RecorderMode::Read,
            name: String::new(),
            start_url: None,
            script_path: Some(script_path.into()),
            output_path: None,
            config,
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Explicit output path, else `<output_dir>/<name>.yaml`
    pub fn resolved_output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| self.config.output_dir.join(format!("{}.yaml", file_slug(&self.name))))
    }
}

fn file_slug(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "recording".to_string()
    } else {
        slug
    }
}

/// Result of one unit of pipeline work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Finished,
}

#[async_trait]
pub trait SessionPipeline: Send {
    async fn start(&mut self) -> Result<(), RecorderError>;

    /// One poll (write) or one replayed step (read).
    ///
    /// The recorder drops this future when the session exits. Work already
    /// taken from the page must survive that and be completed by `finish`.
    async fn tick(&mut self) -> Result<Tick, RecorderError>;

    /// Delay before the next tick
    fn next_delay(&self) -> Duration;

    async fn set_paused(&mut self, paused: bool);

    async fn save(&mut self) -> Result<(), RecorderError>;

    /// Finalizes pending state and releases the page
    async fn finish(&mut self) -> Result<(), RecorderError>;

    /// Runs a single click/type/press through the resolver, outside of recording
    async fn direct(&mut self, command: &CommandKind) -> Result<Option<Resolution>, RecorderError>;

    fn fill_status(&self, status: &mut SessionStatus);
}

pub async fn build_pipeline(
    options: &SessionOptions,
    browser: Arc<dyn BrowserControl>,
    events: EventSink,
) -> Result<Box<dyn SessionPipeline>, RecorderError> {
    let config = &options.config;
    let resolver = Resolver::new(
        ScoreTable::new(&config.field_keywords),
        config.ready_timeout,
        config.cursor_travel,
    );

    match options.mode {
        RecorderMode::Write => {
            let path = options.resolved_output_path();
            let script = ActionScript::new(options.name.clone(), options.start_url.clone());
            let store = ActionStore::create(path, script, config.autosave);
            Ok(Box::new(CaptureToStore::new(options, browser, events, store, resolver)))
        }
        RecorderMode::Read => {
            let path = options
                .script_path
                .clone()
                .ok_or_else(|| RecorderError::InvalidScript("read mode needs a script path".to_string()))?;
            let store = ActionStore::load(&path).await?;
            let runner = ReplayRunner::new(resolver, config.step_timeout);
            Ok(Box::new(StoreToResolver::new(options, browser, events, store, runner)))
        }
    }
}

async fn run_direct(
    resolver: &Resolver,
    browser: &dyn BrowserControl,
    events: &EventSink,
    command: &CommandKind,
) -> Result<Option<Resolution>, RecorderError> {
    let (target, result) = match command {
        CommandKind::Click { text } => {
            let target = TargetDescriptor::text(text.clone());
            let result = resolver.click(browser, &target).await.map(Some);
            (Some(target), result)
        }
        CommandKind::Type { text, field } => {
            let target = TargetDescriptor::new(Strategy::Label, field.clone());
            let result = resolver.type_text(browser, &target, text).await.map(Some);
            (Some(target), result)
        }
        CommandKind::Press { key } => (None, resolver.press(browser, key, None).await),
        other => {
            return Err(RecorderError::InvalidAction(format!(
                "{} is not a direct command",
                other.name()
            )))
        }
    };
    report_match(events, target.as_ref(), &result);
    result
}

fn report_match(events: &EventSink, target: Option<&TargetDescriptor>, result: &Result<Option<Resolution>, RecorderError>) {
    match (target, result) {
        (Some(target), Ok(Some(resolution))) => {
            events.match_resolved(target, resolution.candidate.summary(), resolution.score)
        }
        (_, Err(RecorderError::ElementNotFound(unresolved))) => {
            events.match_failed(&unresolved.target, unresolved.considered.clone())
        }
        _ => {}
    }
}

/// Write mode
pub struct CaptureToStore {
    browser: Arc<dyn BrowserControl>,
    events: EventSink,
    capture: EventCapture,
    accumulator: Accumulator,
    /// Folded actions waiting to be stored, oldest first
    ready: VecDeque<Action>,
    store: ActionStore,
    resolver: Resolver,
    start_url: Option<String>,
    screenshots: bool,
    paused: bool,
}

impl CaptureToStore {
    pub fn new(
        options: &SessionOptions,
        browser: Arc<dyn BrowserControl>,
        events: EventSink,
        store: ActionStore,
        resolver: Resolver,
    ) -> Self {
        let config = &options.config;
        let accumulator = Accumulator::new(
            SubmitClassifier::new(&config.submit_keywords),
            AccumulatorSettings {
                navigation_follow: config.navigation_follow,
                wait_threshold: config.wait_threshold,
            },
        );
        Self {
            browser,
            events,
            capture: EventCapture::new(config.poll, config.injection),
            accumulator,
            ready: VecDeque::new(),
            store,
            resolver,
            start_url: options.start_url.clone(),
            screenshots: config.screenshots,
            paused: false,
        }
    }

    fn fold(&mut self, raw: Vec<RawEvent>) {
        for event in raw {
            self.ready.extend(self.accumulator.process(event));
        }
    }

    /// Stores every ready action. An action leaves the queue only when the
    /// store takes it, so an interrupted call loses nothing.
    async fn record_ready(&mut self) -> Result<(), RecorderError> {
        while !self.ready.is_empty() {
            let screenshot_ref = self.screenshot().await?;
            let Some(mut action) = self.ready.pop_front() else {
                break;
            };
            if let Some(reference) = screenshot_ref {
                action.metadata.get_or_insert_with(Default::default).screenshot_ref = Some(reference);
            }

            let stored = self.store.push(action)?;
            info!("Recorded #{}: {}", stored.sequence_index, stored.describe());
            self.events.action_recorded(stored);
            self.store.autosave().await?;
        }
        Ok(())
    }

    /// Screenshot for the next stored action, when enabled
    async fn screenshot(&self) -> Result<Option<String>, RecorderError> {
        if !self.screenshots {
            return Ok(None);
        }
        match self.browser.screenshot().await {
            Ok(png) => Ok(Some(
                self.store.write_screenshot(self.store.next_index(), &png).await?,
            )),
            Err(e) => {
                warn!("Screenshot skipped: {}", e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SessionPipeline for CaptureToStore {
    async fn start(&mut self) -> Result<(), RecorderError> {
        // Registered before navigating so the first document is instrumented from the start
        self.capture
            .install(self.browser.as_ref(), self.accumulator.epoch())
            .await?;

        if let Some(url) = self.start_url.clone() {
            let open = self.accumulator.open(&url, chrono::Utc::now().timestamp_millis());
            self.ready.push_back(open);
            self.record_ready().await?;
            self.browser.navigate(&url).await?;
        }
        Ok(())
    }

    async fn tick(&mut self) -> Result<Tick, RecorderError> {
        let raw = self
            .capture
            .poll(self.browser.as_ref(), self.accumulator.epoch())
            .await?;
        self.fold(raw);
        self.record_ready().await?;
        Ok(Tick::Continue)
    }

    fn next_delay(&self) -> Duration {
        self.capture.next_interval()
    }

    async fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.accumulator.set_paused(paused);
    }

    async fn save(&mut self) -> Result<(), RecorderError> {
        self.store.save().await?;
        info!("Saved {} actions to {}", self.store.len(), self.store.path().display());
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RecorderError> {
        if !self.paused {
            match self.capture.poll(self.browser.as_ref(), self.accumulator.epoch()).await {
                Ok(raw) => self.fold(raw),
                Err(e) => debug!("Final poll skipped: {}", e),
            }
        }
        self.ready.extend(self.accumulator.flush());
        self.record_ready().await?;
        self.store.save().await?;
        self.capture.teardown(self.browser.as_ref()).await;
        info!(
            "Recording finished: {} actions in {}",
            self.store.len(),
            self.store.path().display()
        );
        Ok(())
    }

    async fn direct(&mut self, command: &CommandKind) -> Result<Option<Resolution>, RecorderError> {
        let browser = self.browser.as_ref();
        self.capture.set_paused(browser, true).await;
        let result = run_direct(&self.resolver, browser, &self.events, command).await;
        self.capture.set_paused(browser, false).await;
        result
    }

    fn fill_status(&self, status: &mut SessionStatus) {
        status.action_count = self.store.len();
        status.navigation_epoch = self.accumulator.epoch();
        status.has_pending_input = self.accumulator.has_pending_input();
        status.output_path = Some(self.store.path().display().to_string());
    }
}

/// Read mode
pub struct StoreToResolver {
    browser: Arc<dyn BrowserControl>,
    events: EventSink,
    runner: ReplayRunner,
    actions: Vec<Action>,
    start_url: Option<String>,
    script_path: PathBuf,
    position: usize,
    reports: Vec<StepReport>,
    continue_on_error: bool,
    step_delay: Duration,
}

impl StoreToResolver {
    pub fn new(
        options: &SessionOptions,
        browser: Arc<dyn BrowserControl>,
        events: EventSink,
        store: ActionStore,
        runner: ReplayRunner,
    ) -> Self {
        let start_url = options
            .start_url
            .clone()
            .or_else(|| store.script().start_url.clone());
        Self {
            browser,
            events,
            runner,
            actions: store.actions().to_vec(),
            start_url,
            script_path: store.path().to_path_buf(),
            position: 0,
            reports: Vec::new(),
            continue_on_error: options.config.continue_on_error,
            step_delay: options.config.step_delay,
        }
    }
}

#[async_trait]
impl SessionPipeline for StoreToResolver {
    async fn start(&mut self) -> Result<(), RecorderError> {
        info!(
            "Replaying {} actions from {}",
            self.actions.len(),
            self.script_path.display()
        );
        let opens_itself = self.actions.first().is_some_and(|a| a.kind == ActionKind::GoTo);
        if let (Some(url), false) = (&self.start_url, opens_itself) {
            self.browser.navigate(url).await?;
            self.runner.resolver().wait_until_ready(self.browser.as_ref()).await?;
        }
        Ok(())
    }

    async fn tick(&mut self) -> Result<Tick, RecorderError> {
        let Some(action) = self.actions.get(self.position).cloned() else {
            return Ok(Tick::Finished);
        };

        let started = Instant::now();
        let result = self.runner.execute(self.browser.as_ref(), &action).await;
        let report = ReplayRunner::report(&action, &result, started);

        report_match(&self.events, action.target.as_ref(), &result);
        self.events.step_completed(&report);
        self.reports.push(report);
        self.position += 1;

        if let Err(e) = result {
            if !self.continue_on_error {
                return Err(e);
            }
            warn!("Step #{} failed, continuing: {}", action.sequence_index, e);
        }

        if self.position >= self.actions.len() {
            info!("Replay finished: {} steps", self.reports.len());
            Ok(Tick::Finished)
        } else {
            Ok(Tick::Continue)
        }
    }

    fn next_delay(&self) -> Duration {
        if self.position == 0 {
            Duration::ZERO
        } else {
            self.step_delay
        }
    }

    async fn set_paused(&mut self, _paused: bool) {}

    async fn save(&mut self) -> Result<(), RecorderError> {
        debug!("Nothing to save in read mode");
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }

    async fn direct(&mut self, command: &CommandKind) -> Result<Option<Resolution>, RecorderError> {
        run_direct(self.runner.resolver(), self.browser.as_ref(), &self.events, command).await
    }

    fn fill_status(&self, status: &mut SessionStatus) {
        status.action_count = self.actions.len();
        status.current_step = self.position;
        status.reports = self.reports.clone();
        status.output_path = Some(self.script_path.display().to_string());
    }
}
