use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::action::ActionKind;
use super::target::TargetDescriptor;

/// Which pipeline a session runs; fixed when the session is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderMode {
    /// Capture -> Accumulator -> Store
    Write,
    /// Store -> Resolver -> browser
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Replaying,
    Paused,
    Stopped,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Replaying => "replaying",
            RecorderState::Paused => "paused",
            RecorderState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Outcome of one replayed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub sequence_index: u64,
    pub kind: ActionKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetDescriptor>,
    /// Score of the element the resolver picked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    /// `<tag> "text"` of the element the resolver picked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl StepReport {
    pub fn success(sequence_index: u64, kind: ActionKind, duration_ms: u64) -> Self {
        Self {
            sequence_index,
            kind,
            success: true,
            target: None,
            score: None,
            matched: None,
            error: None,
            duration_ms,
        }
    }

    pub fn failure(sequence_index: u64, kind: ActionKind, error: String) -> Self {
        Self {
            sequence_index,
            kind,
            success: false,
            target: None,
            score: None,
            matched: None,
            error: Some(error),
            duration_ms: 0,
        }
    }
}

/// Snapshot of a session, returned by the status command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub mode: RecorderMode,
    pub state: RecorderState,
    /// Actions stored (write) or loaded (read)
    pub action_count: usize,
    /// Next action to replay (read mode)
    #[serde(default)]
    pub current_step: usize,
    #[serde(default)]
    pub navigation_epoch: u64,
    #[serde(default)]
    pub has_pending_input: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}
