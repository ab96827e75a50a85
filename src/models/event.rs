use serde::{Deserialize, Serialize};

/// Kind of DOM event reported by the in-page instrumentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Click,
    Input,
    Blur,
    Navigation,
    Scroll,
    Keydown,
}

/// A point in viewport coordinates (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Snapshot of an element at the moment an event fired.
///
/// Every textual field is optional; the instrumentation sends `null` (or the
/// literal string `"unknown"`) when the element has no such signal. `position`
/// is always present and is the element's center in the viewport.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementDescriptor {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Nearby text (legend, preceding heading or sibling label) used for type+context matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub position: Position,
}

const TEXT_ENTRY_TYPES: &[&str] = &[
    "text", "email", "password", "search", "tel", "url", "number", "date", "datetime-local",
    "month", "week", "time",
];

impl ElementDescriptor {
    pub fn tag(&self) -> String {
        self.tag_name.to_lowercase()
    }

    pub fn input_type_lower(&self) -> Option<String> {
        meaningful(&self.input_type).map(|t| t.to_lowercase())
    }

    /// Form controls that carry a value (input, textarea, select, contenteditable)
    pub fn is_form_control(&self) -> bool {
        matches!(self.tag().as_str(), "input" | "textarea" | "select")
            || self.role.as_deref() == Some("textbox")
    }

    /// Controls the user types into, as opposed to checkboxes and buttons
    pub fn is_text_entry(&self) -> bool {
        match self.tag().as_str() {
            "textarea" => true,
            "input" => match self.input_type_lower() {
                None => true,
                Some(t) => TEXT_ENTRY_TYPES.contains(&t.as_str()),
            },
            _ => self.role.as_deref() == Some("textbox"),
        }
    }

    /// Buttons, links and anything announcing itself as one
    pub fn is_interactive(&self) -> bool {
        let tag = self.tag();
        if matches!(tag.as_str(), "button" | "a" | "summary") {
            return true;
        }
        if tag == "input" {
            if let Some(t) = self.input_type_lower() {
                return matches!(t.as_str(), "submit" | "button" | "reset" | "image");
            }
        }
        matches!(
            self.role.as_deref(),
            Some("button") | Some("link") | Some("menuitem") | Some("tab") | Some("option")
        )
    }
}

/// Returns the trimmed value when it carries a real signal
pub fn meaningful(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
}

/// An event drained from the in-page queue.
///
/// `epoch` is the navigation epoch stamped on the document when the event was
/// queued; events from a document that was never stamped get the epoch the
/// capture assigned when it discovered that document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, rename = "element", skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Scroll offset after the scroll settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<Position>,
    /// Buttons found in the same form as the keydown target (Enter only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nearby_controls: Vec<ElementDescriptor>,
    #[serde(default)]
    pub epoch: Option<u64>,
}

impl RawEvent {
    pub fn new(kind: EventKind, timestamp: i64) -> Self {
        Self {
            kind,
            timestamp,
            element: None,
            value: None,
            key: None,
            url: None,
            scroll: None,
            nearby_controls: Vec::new(),
            epoch: None,
        }
    }

    pub fn with_element(mut self, element: ElementDescriptor) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn epoch_or(&self, fallback: u64) -> u64 {
        self.epoch.unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_not_meaningful() {
        assert_eq!(meaningful(&Some("unknown".into())), None);
        assert_eq!(meaningful(&Some("  ".into())), None);
        assert_eq!(meaningful(&Some(" Email ".into())), Some("Email"));
        assert_eq!(meaningful(&None), None);
    }

    #[test]
    fn test_text_entry_classification() {
        let mut input = ElementDescriptor {
            tag_name: "INPUT".into(),
            ..Default::default()
        };
        assert!(input.is_text_entry());

        input.input_type = Some("checkbox".into());
        assert!(!input.is_text_entry());
        assert!(input.is_form_control());

        input.input_type = Some("submit".into());
        assert!(input.is_interactive());
    }

    #[test]
    fn test_raw_event_from_script_payload() {
        let json = r#"{
            "kind": "input",
            "timestamp": 1700000000000,
            "element": {"tag_name": "input", "placeholder": "E-mail", "position": {"x": 10, "y": 20}},
            "value": "ab",
            "epoch": 2
        }"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Input);
        assert_eq!(event.value.as_deref(), Some("ab"));
        assert_eq!(event.epoch, Some(2));
        let element = event.element.unwrap();
        assert_eq!(element.placeholder.as_deref(), Some("E-mail"));
        assert_eq!(element.position, Position::new(10.0, 20.0));
    }
}
