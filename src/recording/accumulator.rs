//! Folds raw DOM events into finalized actions.
//!
//! Text entry arrives as a run of cumulative `input` events; the accumulator
//! keeps one pending input and turns it into a single `type` action when the
//! field is blurred, Enter is pressed, the user clicks elsewhere, the page
//! navigates, or an event from a newer navigation epoch shows up.

use std::time::Duration;
use tracing::{debug, info};

use super::classify::SubmitClassifier;
use crate::identify::{identify, identify_for_input};
use crate::models::{Action, ActionKind, ElementDescriptor, EventKind, RawEvent, TargetDescriptor};

/// Window in which the browser's synthetic click after an Enter-submit is ignored
const IMPLICIT_SUBMIT_WINDOW_MS: i64 = 1000;

#[derive(Debug, Clone)]
pub struct AccumulatorSettings {
    pub navigation_follow: Duration,
    pub wait_threshold: Option<Duration>,
}

impl Default for AccumulatorSettings {
    fn default() -> Self {
        Self {
            navigation_follow: Duration::from_secs(3),
            wait_threshold: None,
        }
    }
}

/// Text entry not yet turned into an action
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInput {
    pub target: TargetDescriptor,
    pub text: String,
    /// Navigation epoch the field was first typed into
    pub epoch: u64,
    pub opened_at: i64,
}

#[derive(Debug, Clone)]
struct SuppressedClick {
    target: TargetDescriptor,
    epoch: u64,
    until: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AccumulatorState {
    pub pending_input: Option<PendingInput>,
    pub epoch: u64,
    pub paused: bool,
    last_action: Option<(ActionKind, i64)>,
    last_event_at: Option<i64>,
    last_url: Option<String>,
    suppressed_click: Option<SuppressedClick>,
}

enum InputDecision {
    Open,
    Merge,
    Switch,
    Stale,
}

pub struct Accumulator {
    state: AccumulatorState,
    classifier: SubmitClassifier,
    settings: AccumulatorSettings,
}

impl Accumulator {
    pub fn new(classifier: SubmitClassifier, settings: AccumulatorSettings) -> Self {
        Self {
            state: AccumulatorState::default(),
            classifier,
            settings,
        }
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.state.epoch
    }

    pub fn has_pending_input(&self) -> bool {
        self.state.pending_input.is_some()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    /// The `go_to` that opens a recording
    pub fn open(&mut self, url: &str, timestamp: i64) -> Action {
        self.state.last_url = Some(url.to_string());
        self.state.last_action = Some((ActionKind::GoTo, timestamp));
        self.state.last_event_at = Some(timestamp);
        Action::go_to(url)
    }

    /// Consumes one event and returns the actions it finalized, in order
    pub fn process(&mut self, event: RawEvent) -> Vec<Action> {
        if self.state.paused {
            if event.kind == EventKind::Navigation {
                self.advance_epoch(&event);
            } else {
                debug!("Paused, dropping {:?} event", event.kind);
            }
            return Vec::new();
        }

        let timestamp = event.timestamp;
        let gap = self.state.last_event_at.map(|last| timestamp - last);
        self.state.last_event_at = Some(self.state.last_event_at.map_or(timestamp, |t| t.max(timestamp)));

        let mut actions = match event.kind {
            EventKind::Input => self.on_input(event),
            EventKind::Blur => self.on_blur(event),
            EventKind::Keydown => self.on_keydown(event),
            EventKind::Click => self.on_click(event),
            EventKind::Navigation => self.on_navigation(event),
            EventKind::Scroll => self.on_scroll(event),
        };

        if let (Some(threshold), Some(gap)) = (self.settings.wait_threshold, gap) {
            if !actions.is_empty() && gap >= threshold.as_millis() as i64 {
                actions.insert(0, Action::wait(gap as u64));
            }
        }

        if let Some(last) = actions.last() {
            self.state.last_action = Some((last.kind, timestamp));
        }
        actions
    }

    /// Finalizes the pending input, if any
    pub fn flush(&mut self) -> Option<Action> {
        let pending = self.state.pending_input.take()?;
        info!(
            "Finalized input into {} ({} chars, epoch {})",
            pending.target,
            pending.text.chars().count(),
            pending.epoch
        );
        Some(Action::type_text(pending.target, pending.text))
    }

    fn flush_into(&mut self, actions: &mut Vec<Action>) {
        if let Some(action) = self.flush() {
            actions.push(action);
        }
    }

    fn on_input(&mut self, event: RawEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(element) = event.element.as_ref() else {
            return actions;
        };
        let epoch = event.epoch_or(self.state.epoch);
        let target = identify_for_input(element);
        let value = event.value.clone().unwrap_or_default();

        let decision = match &self.state.pending_input {
            None => InputDecision::Open,
            Some(p) if p.epoch != epoch => InputDecision::Stale,
            Some(p) if p.target.same_element(&target) => InputDecision::Merge,
            Some(_) => InputDecision::Switch,
        };

        match decision {
            InputDecision::Merge => {
                if let Some(pending) = self.state.pending_input.as_mut() {
                    pending.text = value;
                }
                return actions;
            }
            InputDecision::Stale => {
                debug!(
                    "Pending input from epoch {} is stale (event epoch {}), finalizing",
                    self.state.pending_input.as_ref().map_or(0, |p| p.epoch),
                    epoch
                );
                self.flush_into(&mut actions);
            }
            InputDecision::Switch => self.flush_into(&mut actions),
            InputDecision::Open => {}
        }

        debug!("Opened pending input for {}", target);
        self.state.pending_input = Some(PendingInput {
            target,
            text: value,
            epoch,
            opened_at: event.timestamp,
        });
        actions
    }

    fn on_blur(&mut self, event: RawEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(element) = event.element.as_ref() {
            if self.is_pending_target(element) {
                self.flush_into(&mut actions);
            }
        }
        actions
    }

    fn on_keydown(&mut self, event: RawEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(key) = event.key.as_deref().filter(|k| !k.is_empty()) else {
            return actions;
        };
        let element = event.element.as_ref();

        if key != "Enter" {
            if element.is_some_and(|el| self.is_pending_target(el)) {
                self.flush_into(&mut actions);
            }
            let target = element.filter(|el| el.is_form_control()).map(identify_for_input);
            actions.push(Action::press(key, target));
            return actions;
        }

        if let Some(el) = element {
            // Enter adds a newline in a textarea; on a button or link it fires a click
            if el.tag() == "textarea" || el.is_interactive() {
                return actions;
            }
        }

        self.flush_into(&mut actions);

        if let Some(control) = self.classifier.find_submit(&event.nearby_controls) {
            let target = identify(control);
            debug!("Enter converted to click on submit control {}", target);
            self.state.suppressed_click = Some(SuppressedClick {
                target: target.clone(),
                epoch: event.epoch_or(self.state.epoch),
                until: event.timestamp + IMPLICIT_SUBMIT_WINDOW_MS,
            });
            actions.push(Action::click(target));
        } else {
            let target = element.filter(|el| el.is_form_control()).map(identify_for_input);
            actions.push(Action::press("Enter", target));
        }
        actions
    }

    fn on_click(&mut self, event: RawEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(element) = event.element.as_ref() else {
            return actions;
        };

        // Focusing a field is implied by typing into it on replay
        if element.is_text_entry() || element.tag() == "select" {
            if !self.is_pending_target(element) {
                self.flush_into(&mut actions);
            }
            return actions;
        }

        self.flush_into(&mut actions);

        let target = identify(element);
        let epoch = event.epoch_or(self.state.epoch);
        if let Some(suppressed) = self.state.suppressed_click.take() {
            if suppressed.epoch == epoch && event.timestamp <= suppressed.until && suppressed.target.same_element(&target) {
                debug!("Ignoring synthetic click on {} after Enter", target);
                return actions;
            }
        }

        if self.classifier.is_submit(element) {
            debug!("Click on submit control {}", target);
        }
        actions.push(Action::click(target));
        actions
    }

    fn on_navigation(&mut self, event: RawEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        self.flush_into(&mut actions);
        self.advance_epoch(&event);

        let Some(url) = event.url.filter(|u| !u.is_empty()) else {
            return actions;
        };
        let follow_ms = self.settings.navigation_follow.as_millis() as i64;
        let caused_by_input = matches!(
            self.state.last_action,
            Some((ActionKind::Click | ActionKind::Press, at)) if event.timestamp - at <= follow_ms
        );
        let same_page = self.state.last_url.as_deref() == Some(url.as_str());
        self.state.last_url = Some(url.clone());

        if caused_by_input || same_page {
            debug!("Navigation to {} follows previous action, not recorded", url);
        } else {
            actions.push(Action::go_to(url));
        }
        actions
    }

    fn on_scroll(&mut self, event: RawEvent) -> Vec<Action> {
        match event.scroll {
            Some(offset) => vec![Action::scroll(offset.x, offset.y)],
            None => Vec::new(),
        }
    }

    fn advance_epoch(&mut self, event: &RawEvent) {
        let next = event.epoch_or(self.state.epoch + 1);
        if next > self.state.epoch {
            debug!("Navigation epoch {} -> {}", self.state.epoch, next);
            self.state.epoch = next;
        }
    }

    fn is_pending_target(&self, element: &ElementDescriptor) -> bool {
        self.state
            .pending_input
            .as_ref()
            .is_some_and(|p| p.target.same_element(&identify_for_input(element)))
    }
}
