use serde::Serialize;

use super::session::{RecorderMode, RecorderState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub mode: RecorderMode,
    pub state: RecorderState,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub session_id: String,
    pub state: RecorderState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
