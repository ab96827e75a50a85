//! Session orchestrator: one task per session owns the pipeline and serializes
//! commands with polling (write) or step replay (read).

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info};

use super::pipeline::{build_pipeline, SessionOptions, SessionPipeline, Tick};
use crate::browser::BrowserControl;
use crate::error::RecorderError;
use crate::events::{EventSink, SessionEvent};
use crate::models::{RecorderMode, RecorderState, SessionStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Pause,
    Resume,
    Save,
    Exit,
    Click { text: String },
    Type { text: String, field: String },
    Press { key: String },
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
            CommandKind::Save => "save",
            CommandKind::Exit => "exit",
            CommandKind::Click { .. } => "click",
            CommandKind::Type { .. } => "type",
            CommandKind::Press { .. } => "press",
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(
            self,
            CommandKind::Click { .. } | CommandKind::Type { .. } | CommandKind::Press { .. }
        )
    }
}

/// State machine of a session.
///
/// Pause and resume only suspend write mode; in read mode they are accepted
/// and leave the session replaying.
pub fn transition(
    state: RecorderState,
    mode: RecorderMode,
    command: &CommandKind,
) -> Result<RecorderState, RecorderError> {
    use RecorderState::*;

    let next = match (command, state, mode) {
        (CommandKind::Start, Idle, RecorderMode::Write) => Some(Recording),
        (CommandKind::Start, Idle, RecorderMode::Read) => Some(Replaying),
        (CommandKind::Pause, Recording, _) => Some(Paused),
        (CommandKind::Resume, Paused, _) => Some(Recording),
        (CommandKind::Pause | CommandKind::Resume, Replaying, _) => Some(Replaying),
        (CommandKind::Save, Idle | Recording | Paused | Replaying, _) => Some(state),
        (CommandKind::Exit, Idle | Recording | Paused | Replaying, _) => Some(Stopped),
        (direct, current, _) if direct.is_direct() && current != Stopped => Some(current),
        _ => None,
    };

    next.ok_or_else(|| RecorderError::InvalidTransition {
        state: state.to_string(),
        command: command.name().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub state: RecorderState,
    /// Matched element for direct commands
    pub detail: Option<String>,
}

struct Command {
    kind: CommandKind,
    reply: oneshot::Sender<Result<CommandOutcome, RecorderError>>,
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct RecorderHandle {
    session_id: String,
    mode: RecorderMode,
    commands: mpsc::Sender<Command>,
    shutdown: Arc<watch::Sender<bool>>,
    status: watch::Receiver<SessionStatus>,
}

impl RecorderHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub async fn send(&self, kind: CommandKind) -> Result<CommandOutcome, RecorderError> {
        if kind == CommandKind::Exit {
            // Interrupts an in-flight poll or step before the command is queued
            self.shutdown.send_replace(true);
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command { kind, reply })
            .await
            .map_err(|_| RecorderError::SessionClosed)?;
        response.await.map_err(|_| RecorderError::SessionClosed)?
    }

    pub async fn start(&self) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Start).await
    }

    pub async fn pause(&self) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Pause).await
    }

    pub async fn resume(&self) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Resume).await
    }

    pub async fn save(&self) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Save).await
    }

    pub async fn exit(&self) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Exit).await
    }

    pub async fn click(&self, text: impl Into<String>) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Click { text: text.into() }).await
    }

    pub async fn type_text(
        &self,
        text: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Type {
            text: text.into(),
            field: field.into(),
        })
        .await
    }

    pub async fn press(&self, key: impl Into<String>) -> Result<CommandOutcome, RecorderError> {
        self.send(CommandKind::Press { key: key.into() }).await
    }

    /// Resolves once the session reached `stopped`
    pub async fn wait_stopped(&self) -> SessionStatus {
        let mut status = self.status.clone();
        let _ = status.wait_for(|s| s.state == RecorderState::Stopped).await;
        let current = status.borrow().clone();
        current
    }
}

pub struct Recorder {
    session_id: String,
    mode: RecorderMode,
    state: RecorderState,
    pipeline: Box<dyn SessionPipeline>,
    browser: Arc<dyn BrowserControl>,
    events: EventSink,
    status_tx: watch::Sender<SessionStatus>,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
    started_at: DateTime<Utc>,
    error: Option<String>,
}

impl Recorder {
    /// Builds the pipeline for `options` and spawns the session task in `idle`
    pub async fn launch(
        session_id: impl Into<String>,
        options: SessionOptions,
        browser: Arc<dyn BrowserControl>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<RecorderHandle, RecorderError> {
        let session_id = session_id.into();
        let sink = EventSink::new(session_id.clone(), events);
        let pipeline = build_pipeline(&options, browser.clone(), sink.clone()).await?;
        Ok(Self::spawn(session_id, options.mode, pipeline, browser, sink))
    }

    pub fn spawn(
        session_id: String,
        mode: RecorderMode,
        pipeline: Box<dyn SessionPipeline>,
        browser: Arc<dyn BrowserControl>,
        events: EventSink,
    ) -> RecorderHandle {
        let (command_tx, commands) = mpsc::channel(32);
        let (shutdown_tx, shutdown) = watch::channel(false);
        let started_at = Utc::now();
        let (status_tx, status) = watch::channel(SessionStatus {
            session_id: session_id.clone(),
            mode,
            state: RecorderState::Idle,
            action_count: 0,
            current_step: 0,
            navigation_epoch: 0,
            has_pending_input: false,
            reports: Vec::new(),
            output_path: None,
            error: None,
            started_at,
        });

        let recorder = Recorder {
            session_id: session_id.clone(),
            mode,
            state: RecorderState::Idle,
            pipeline,
            browser,
            events,
            status_tx,
            commands,
            shutdown,
            started_at,
            error: None,
        };
        recorder.publish();
        tokio::spawn(recorder.run());

        RecorderHandle {
            session_id,
            mode,
            commands: command_tx,
            shutdown: Arc::new(shutdown_tx),
            status,
        }
    }

    async fn run(mut self) {
        info!("Session {} ready ({:?} mode)", self.session_id, self.mode);

        while self.state != RecorderState::Stopped {
            let ticking = self.is_ticking() && !*self.shutdown.borrow();
            let delay = self.pipeline.next_delay();

            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        debug!("Session {}: all handles dropped", self.session_id);
                        let from = self.state;
                        let _ = self.stop().await;
                        self.note_transition(from);
                    }
                },
                _ = tokio::time::sleep(delay), if ticking => self.tick().await,
            }
            self.publish();
        }

        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        info!("Session {} stopped", self.session_id);
    }

    fn is_ticking(&self) -> bool {
        match self.state {
            RecorderState::Recording | RecorderState::Replaying => true,
            // Polling continues so navigation epochs stay current; the accumulator drops events
            RecorderState::Paused => self.mode == RecorderMode::Write,
            RecorderState::Idle | RecorderState::Stopped => false,
        }
    }

    async fn tick(&mut self) {
        let from = self.state;
        let result = tokio::select! {
            biased;
            _ = self.shutdown.wait_for(|stop| *stop) => {
                debug!("Session {}: tick interrupted by exit", self.session_id);
                return;
            }
            result = self.pipeline.tick() => result,
        };

        match result {
            Ok(Tick::Continue) => {}
            Ok(Tick::Finished) => self.state = RecorderState::Stopped,
            Err(e) => self.fail(&e).await,
        }
        self.note_transition(from);
    }

    async fn handle(&mut self, command: Command) {
        let Command { kind, reply } = command;
        let from = self.state;
        let result = self.apply(&kind).await;

        match &result {
            Ok(outcome) => debug!("Session {}: {} -> {}", self.session_id, kind.name(), outcome.state),
            Err(e) => debug!("Session {}: {} rejected: {}", self.session_id, kind.name(), e),
        }
        self.note_transition(from);
        self.publish();
        let _ = reply.send(result);
    }

    async fn apply(&mut self, kind: &CommandKind) -> Result<CommandOutcome, RecorderError> {
        let next = transition(self.state, self.mode, kind)?;
        let mut detail = None;

        match kind {
            CommandKind::Start => {
                if let Err(e) = self.pipeline.start().await {
                    self.fail(&e).await;
                    return Err(e);
                }
            }
            CommandKind::Pause | CommandKind::Resume => {
                if self.mode == RecorderMode::Write {
                    self.pipeline.set_paused(*kind == CommandKind::Pause).await;
                } else {
                    info!("Session {}: {} has no effect on replay", self.session_id, kind.name());
                }
            }
            CommandKind::Save => self.pipeline.save().await?,
            CommandKind::Exit => self.stop().await?,
            CommandKind::Click { .. } | CommandKind::Type { .. } | CommandKind::Press { .. } => {
                detail = self
                    .pipeline
                    .direct(kind)
                    .await?
                    .map(|r| format!("{} (score {})", r.candidate.summary(), r.score));
            }
        }

        self.state = next;
        Ok(CommandOutcome {
            state: self.state,
            detail,
        })
    }

    /// Finalizes a started session and moves to `stopped`
    async fn stop(&mut self) -> Result<(), RecorderError> {
        let started = matches!(
            self.state,
            RecorderState::Recording | RecorderState::Paused | RecorderState::Replaying
        );
        self.state = RecorderState::Stopped;
        if !started {
            return Ok(());
        }

        self.pipeline.finish().await.map_err(|e| {
            error!("Session {}: finalizing failed: {}", self.session_id, e);
            self.events.error(e.to_string());
            self.error.get_or_insert_with(|| e.to_string());
            e
        })
    }

    async fn fail(&mut self, e: &RecorderError) {
        error!("Session {} failed: {}", self.session_id, e);
        self.events.error(e.to_string());
        self.error = Some(e.to_string());
        let _ = self.stop().await;
    }

    fn note_transition(&self, from: RecorderState) {
        if from != self.state {
            info!("Session {}: {} -> {}", self.session_id, from, self.state);
            self.events.state_changed(from, self.state);
        }
    }

    fn publish(&self) {
        let mut status = SessionStatus {
            session_id: self.session_id.clone(),
            mode: self.mode,
            state: self.state,
            action_count: 0,
            current_step: 0,
            navigation_epoch: 0,
            has_pending_input: false,
            reports: Vec::new(),
            output_path: None,
            error: self.error.clone(),
            started_at: self.started_at,
        };
        self.pipeline.fill_status(&mut status);
        self.status_tx.send_replace(status);
    }
}
