use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::target::TargetDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Type,
    Press,
    GoTo,
    Scroll,
    Wait,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Press => "press",
            ActionKind::GoTo => "go_to",
            ActionKind::Scroll => "scroll",
            ActionKind::Wait => "wait",
        }
    }
}

/// Out-of-band annotations (captions, narration, screenshots).
///
/// The engine never interprets these; keys it does not know are kept as-is so
/// an edited action list survives a load/save cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_ref: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The unit of record.
///
/// `sequence_index` is assigned by the store when the action is appended;
/// constructors leave it at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub sequence_index: u64,
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionMetadata>,
}

impl Action {
    fn new(kind: ActionKind, target: Option<TargetDescriptor>, payload: Option<String>) -> Self {
        Self {
            sequence_index: 0,
            kind,
            target,
            payload,
            metadata: None,
        }
    }

    pub fn click(target: TargetDescriptor) -> Self {
        Self::new(ActionKind::Click, Some(target), None)
    }

    pub fn type_text(target: TargetDescriptor, text: impl Into<String>) -> Self {
        Self::new(ActionKind::Type, Some(target), Some(text.into()))
    }

    pub fn press(key: impl Into<String>, target: Option<TargetDescriptor>) -> Self {
        Self::new(ActionKind::Press, target, Some(key.into()))
    }

    pub fn go_to(url: impl Into<String>) -> Self {
        Self::new(ActionKind::GoTo, None, Some(url.into()))
    }

    /// Scroll to an absolute page offset
    pub fn scroll(x: f64, y: f64) -> Self {
        Self::new(ActionKind::Scroll, None, Some(format!("{},{}", x.round(), y.round())))
    }

    pub fn wait(ms: u64) -> Self {
        Self::new(ActionKind::Wait, None, Some(ms.to_string()))
    }

    pub fn payload_str(&self) -> &str {
        self.payload.as_deref().unwrap_or("")
    }

    /// Parses a scroll payload (`"x,y"`)
    pub fn scroll_offset(&self) -> Option<(f64, f64)> {
        let (x, y) = self.payload.as_deref()?.split_once(',')?;
        Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
    }

    /// Parses a wait payload in milliseconds
    pub fn wait_ms(&self) -> Option<u64> {
        self.payload.as_deref()?.trim().parse().ok()
    }

    /// Checks the per-kind shape: click/type need a target, go_to/wait must not have one
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            ActionKind::Click | ActionKind::Type if self.target.is_none() => {
                return Err(format!(
                    "{} action #{} requires a target",
                    self.kind.as_str(),
                    self.sequence_index
                ));
            }
            ActionKind::GoTo | ActionKind::Wait if self.target.is_some() => {
                return Err(format!(
                    "{} action #{} must not have a target",
                    self.kind.as_str(),
                    self.sequence_index
                ));
            }
            _ => {}
        }
        match self.kind {
            ActionKind::Type | ActionKind::Press | ActionKind::GoTo if self.payload.is_none() => {
                Err(format!(
                    "{} action #{} requires a payload",
                    self.kind.as_str(),
                    self.sequence_index
                ))
            }
            ActionKind::Scroll if self.scroll_offset().is_none() => Err(format!(
                "scroll action #{} needs an 'x,y' payload",
                self.sequence_index
            )),
            ActionKind::Wait if self.wait_ms().is_none() => Err(format!(
                "wait action #{} needs a millisecond payload",
                self.sequence_index
            )),
            _ => Ok(()),
        }
    }

    /// Short human label for logs and captions
    pub fn describe(&self) -> String {
        match (&self.kind, &self.target) {
            (ActionKind::Click, Some(t)) => format!("click {}", t),
            (ActionKind::Type, Some(t)) => format!("type '{}' into {}", truncate(self.payload_str(), 30), t),
            (ActionKind::Press, Some(t)) => format!("press {} in {}", self.payload_str(), t),
            (ActionKind::Press, None) => format!("press {}", self.payload_str()),
            (ActionKind::GoTo, _) => format!("go to {}", self.payload_str()),
            (ActionKind::Scroll, _) => format!("scroll to {}", self.payload_str()),
            (ActionKind::Wait, _) => format!("wait {}ms", self.payload_str()),
            (kind, None) => kind.as_str().to_string(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

/// The persisted, human-editable action list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionScript {
    #[serde(default = "default_version")]
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl ActionScript {
    pub fn new(name: impl Into<String>, start_url: Option<String>) -> Self {
        Self {
            version: default_version(),
            name: name.into(),
            start_url,
            created_at: Utc::now(),
            actions: Vec::new(),
        }
    }

    /// Validates ordering and per-action shape
    pub fn validate(&self) -> Result<(), String> {
        let mut last: Option<u64> = None;
        for action in &self.actions {
            if let Some(prev) = last {
                if action.sequence_index <= prev {
                    return Err(format!(
                        "sequence_index {} does not follow {}",
                        action.sequence_index, prev
                    ));
                }
            }
            action.validate()?;
            last = Some(action.sequence_index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Strategy;

    #[test]
    fn test_target_invariant() {
        let mut click = Action::click(TargetDescriptor::text("Entrar"));
        assert!(click.validate().is_ok());
        click.target = None;
        assert!(click.validate().is_err());

        let mut go_to = Action::go_to("https://example.com");
        assert!(go_to.validate().is_ok());
        go_to.target = Some(TargetDescriptor::text("x"));
        assert!(go_to.validate().is_err());
    }

    #[test]
    fn test_scroll_and_wait_payloads() {
        let scroll = Action::scroll(0.0, 640.4);
        assert_eq!(scroll.payload_str(), "0,640");
        assert_eq!(scroll.scroll_offset(), Some((0.0, 640.0)));
        assert_eq!(Action::wait(1500).wait_ms(), Some(1500));
    }

    #[test]
    fn test_script_rejects_out_of_order_indices() {
        let mut script = ActionScript::new("login", None);
        let mut first = Action::go_to("https://example.com");
        first.sequence_index = 2;
        let mut second = Action::click(TargetDescriptor::new(Strategy::Text, "Entrar"));
        second.sequence_index = 2;
        script.actions = vec![first, second];
        assert!(script.validate().is_err());

        script.actions[1].sequence_index = 3;
        assert!(script.validate().is_ok());
    }

    #[test]
    fn test_unknown_metadata_is_preserved() {
        let yaml = r#"
sequence_index: 4
kind: click
target:
  strategy: text
  value: Salvar
metadata:
  caption: Save the record
  voice: pt-BR-Francisca
"#;
        let action: Action = serde_yaml::from_str(yaml).unwrap();
        let metadata = action.metadata.clone().unwrap();
        assert_eq!(metadata.caption.as_deref(), Some("Save the record"));
        assert!(metadata.extra.contains_key("voice"));

        let back = serde_yaml::to_string(&action).unwrap();
        assert!(back.contains("voice: pt-BR-Francisca"));
    }
}
