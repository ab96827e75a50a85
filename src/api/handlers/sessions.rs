use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::state::{ActiveSession, AppState};
use crate::browser::{BrowserControl, BrowserManager, LaunchOptions};
use crate::error::{AppError, RecorderError, Result};
use crate::models::{CommandResponse, RecorderMode, SessionStatus, StartSessionRequest, StartSessionResponse};
use crate::recording::{CommandKind, Recorder, SessionOptions};

/// Launch a browser, build the session for the requested mode and start it
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>> {
    let options = session_options(&state, &request)?;
    let launch = LaunchOptions {
        headless: options.config.headless,
        width: viewport_dimension("viewport_width", request.viewport_width)?,
        height: viewport_dimension("viewport_height", request.viewport_height)?,
        incognito: true,
    };

    // One browser launch at a time
    let _launch_guard = state.session_lock.lock().await;

    let session_id = Uuid::new_v4().to_string();
    let browser = Arc::new(BrowserManager::new());
    browser.launch(&launch).await.map_err(RecorderError::Browser)?;

    let handle = match Recorder::launch(
        session_id.clone(),
        options,
        browser.clone(),
        state.ws_broadcast.clone(),
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to create session {}: {}", session_id, e);
            let _ = browser.close().await;
            return Err(e.into());
        }
    };

    // A failed start stops the session and closes its browser
    let outcome = handle.start().await?;
    tracing::info!(
        "Session {} started ({:?} mode, {})",
        session_id,
        request.mode,
        outcome.state
    );

    state.sessions.insert(
        session_id.clone(),
        ActiveSession {
            handle,
            client_id: request.client_id.clone(),
        },
    );

    Ok(Json(StartSessionResponse {
        session_id,
        mode: request.mode,
        state: outcome.state,
    }))
}

fn session_options(state: &AppState, request: &StartSessionRequest) -> Result<SessionOptions> {
    let mut config = state.config.recorder.clone();
    if let Some(headless) = request.headless {
        config.headless = headless;
    }
    if let Some(continue_on_error) = request.continue_on_error {
        config.continue_on_error = continue_on_error;
    }

    let options = match request.mode {
        RecorderMode::Write => {
            let name = request
                .name
                .clone()
                .unwrap_or_else(|| format!("recording-{}", Utc::now().format("%Y%m%d-%H%M%S")));
            let options = SessionOptions::write(name, request.start_url.clone(), config);
            match &request.output_path {
                Some(path) => options.with_output_path(path),
                None => options,
            }
        }
        RecorderMode::Read => {
            let path = request
                .script_path
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| AppError::ValidationError("script_path is required in read mode".to_string()))?;
            let mut options = SessionOptions::read(path, config);
            options.start_url = request.start_url.clone();
            options
        }
    };
    Ok(options)
}

fn viewport_dimension(name: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| AppError::ValidationError(format!("{} must be positive, got {}", name, value)))
}

pub async fn get_session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatus>> {
    let handle = state
        .handle(&session_id)
        .ok_or_else(|| AppError::SessionNotFound(session_id.clone()))?;
    Ok(Json(handle.status()))
}

pub async fn pause_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<CommandResponse>> {
    run_command(&state, session_id, CommandKind::Pause).await
}

pub async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<CommandResponse>> {
    run_command(&state, session_id, CommandKind::Resume).await
}

pub async fn save_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<CommandResponse>> {
    run_command(&state, session_id, CommandKind::Save).await
}

/// Finalize the session; its status stays queryable afterwards
pub async fn exit_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<CommandResponse>> {
    run_command(&state, session_id, CommandKind::Exit).await
}

pub(super) async fn run_command(
    state: &AppState,
    session_id: String,
    command: CommandKind,
) -> Result<Json<CommandResponse>> {
    let handle = state
        .handle(&session_id)
        .ok_or_else(|| AppError::SessionNotFound(session_id.clone()))?;

    let name = command.name();
    let outcome = handle.send(command).await.map_err(|e| {
        tracing::warn!("Session {}: {} failed: {}", session_id, name, e);
        e
    })?;

    Ok(Json(CommandResponse {
        session_id,
        state: outcome.state,
        detail: outcome.detail,
    }))
}
