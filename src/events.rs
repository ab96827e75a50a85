use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Action, RecorderState, StepReport, TargetDescriptor};
use crate::replay::ScoredCandidate;

/// Observability feed for one session, forwarded to WebSocket clients as JSON
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        session_id: String,
        from: RecorderState,
        to: RecorderState,
    },
    ActionRecorded {
        session_id: String,
        action: Action,
    },
    MatchResolved {
        session_id: String,
        target: TargetDescriptor,
        matched: String,
        score: i32,
    },
    MatchFailed {
        session_id: String,
        target: TargetDescriptor,
        considered: Vec<ScoredCandidate>,
    },
    StepCompleted {
        session_id: String,
        report: StepReport,
    },
    Error {
        session_id: String,
        message: String,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::StateChanged { session_id, .. }
            | SessionEvent::ActionRecorded { session_id, .. }
            | SessionEvent::MatchResolved { session_id, .. }
            | SessionEvent::MatchFailed { session_id, .. }
            | SessionEvent::StepCompleted { session_id, .. }
            | SessionEvent::Error { session_id, .. } => session_id,
        }
    }
}

/// Sends events tagged with one session's id
#[derive(Debug, Clone)]
pub struct EventSink {
    session_id: String,
    tx: broadcast::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(session_id: impl Into<String>, tx: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            session_id: session_id.into(),
            tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn send(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn state_changed(&self, from: RecorderState, to: RecorderState) {
        self.send(SessionEvent::StateChanged {
            session_id: self.session_id.clone(),
            from,
            to,
        });
    }

    pub fn action_recorded(&self, action: &Action) {
        self.send(SessionEvent::ActionRecorded {
            session_id: self.session_id.clone(),
            action: action.clone(),
        });
    }

    pub fn match_resolved(&self, target: &TargetDescriptor, matched: String, score: i32) {
        self.send(SessionEvent::MatchResolved {
            session_id: self.session_id.clone(),
            target: target.clone(),
            matched,
            score,
        });
    }

    pub fn match_failed(&self, target: &TargetDescriptor, considered: Vec<ScoredCandidate>) {
        self.send(SessionEvent::MatchFailed {
            session_id: self.session_id.clone(),
            target: target.clone(),
            considered,
        });
    }

    pub fn step_completed(&self, report: &StepReport) {
        self.send(SessionEvent::StepCompleted {
            session_id: self.session_id.clone(),
            report: report.clone(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(SessionEvent::Error {
            session_id: self.session_id.clone(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_type_tag() {
        let (tx, mut rx) = broadcast::channel(4);
        let sink = EventSink::new("s1", tx);
        sink.state_changed(RecorderState::Idle, RecorderState::Recording);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session_id(), "s1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["to"], "recording");
    }
}
