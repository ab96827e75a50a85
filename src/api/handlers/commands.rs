use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::sessions::run_command;
use crate::api::state::AppState;
use crate::error::{AppError, Result};
use crate::models::{ClickRequest, CommandResponse, PressRequest, TypeRequest};
use crate::recording::CommandKind;

fn required(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Click the element best matching `text` on the live page
pub async fn click(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<ClickRequest>,
) -> Result<Json<CommandResponse>> {
    required("text", &request.text)?;
    run_command(&state, session_id, CommandKind::Click { text: request.text }).await
}

/// Type `text` into the field labelled `field`
pub async fn type_text(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<TypeRequest>,
) -> Result<Json<CommandResponse>> {
    required("field", &request.field)?;
    run_command(
        &state,
        session_id,
        CommandKind::Type {
            text: request.text,
            field: request.field,
        },
    )
    .await
}

pub async fn press(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<PressRequest>,
) -> Result<Json<CommandResponse>> {
    required("key", &request.key)?;
    run_command(&state, session_id, CommandKind::Press { key: request.key }).await
}
