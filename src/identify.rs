//! Element identification: turns an [`ElementDescriptor`] captured at event
//! time into the [`TargetDescriptor`] that is persisted and later re-matched.
//!
//! Precedence for general targets:
//! 1. visible text on interactive elements (buttons, links, `role=button`)
//! 2. associated `<label>` text (form controls)
//! 3. placeholder
//! 4. ARIA label
//! 5. input `type` + nearby context
//! 6. visible text on non-interactive elements
//! 7. viewport position
//!
//! Input fields use [`identify_for_input`], which skips visible text and tries
//! name/id attributes before falling back to position.

use crate::models::{meaningful, Disambiguators, ElementDescriptor, Strategy, TargetDescriptor};

/// Text longer than this is page content, not an element's name
const MAX_TEXT_SIGNAL: usize = 80;

/// Input types specific enough to identify a field without context
const DISTINCTIVE_INPUT_TYPES: &[&str] = &[
    "email", "password", "search", "tel", "url", "number", "date", "file", "checkbox", "radio",
];

pub fn identify(descriptor: &ElementDescriptor) -> TargetDescriptor {
    let disambiguators = disambiguators(descriptor);

    let strategy_value = text_signal(descriptor)
        .filter(|_| descriptor.is_interactive())
        .map(|t| (Strategy::Text, t))
        .or_else(|| label_signal(descriptor).map(|v| (Strategy::Label, v)))
        .or_else(|| meaningful(&descriptor.placeholder).map(|v| (Strategy::Placeholder, v.to_string())))
        .or_else(|| meaningful(&descriptor.aria_label).map(|v| (Strategy::Aria, v.to_string())))
        .or_else(|| type_context(descriptor).map(|v| (Strategy::TypeContext, v)))
        .or_else(|| text_signal(descriptor).map(|t| (Strategy::Text, t)));

    match strategy_value {
        Some((strategy, value)) => TargetDescriptor::new(strategy, value).with_disambiguators(disambiguators),
        None => position_target(descriptor, disambiguators),
    }
}

pub fn identify_for_input(descriptor: &ElementDescriptor) -> TargetDescriptor {
    let disambiguators = disambiguators(descriptor);

    let strategy_value = label_signal(descriptor)
        .map(|v| (Strategy::Label, v))
        .or_else(|| meaningful(&descriptor.placeholder).map(|v| (Strategy::Placeholder, v.to_string())))
        .or_else(|| meaningful(&descriptor.aria_label).map(|v| (Strategy::Aria, v.to_string())))
        .or_else(|| type_context(descriptor).map(|v| (Strategy::TypeContext, v)))
        .or_else(|| {
            meaningful(&descriptor.name)
                .or_else(|| meaningful(&descriptor.id))
                .map(|v| (Strategy::Attribute, v.to_string()))
        });

    match strategy_value {
        Some((strategy, value)) => TargetDescriptor::new(strategy, value).with_disambiguators(disambiguators),
        None => position_target(descriptor, disambiguators),
    }
}

/// Collapses whitespace; `None` for empty or oversized text
fn text_signal(descriptor: &ElementDescriptor) -> Option<String> {
    let text = meaningful(&descriptor.text)?;
    let normalized = normalize_whitespace(text);
    if normalized.chars().count() > MAX_TEXT_SIGNAL {
        return None;
    }
    Some(normalized)
}

fn label_signal(descriptor: &ElementDescriptor) -> Option<String> {
    if !descriptor.is_form_control() {
        return None;
    }
    meaningful(&descriptor.label).map(|l| normalize_whitespace(l.trim_end_matches([':', '*']).trim()))
}

/// "the email field": context text when present, else a distinctive input type
fn type_context(descriptor: &ElementDescriptor) -> Option<String> {
    let input_type = descriptor.input_type_lower()?;
    if let Some(context) = meaningful(&descriptor.context) {
        return Some(normalize_whitespace(context));
    }
    DISTINCTIVE_INPUT_TYPES
        .contains(&input_type.as_str())
        .then_some(input_type)
}

fn position_target(descriptor: &ElementDescriptor, disambiguators: Disambiguators) -> TargetDescriptor {
    let p = descriptor.position;
    TargetDescriptor::new(Strategy::Position, format!("{},{}", p.x.round(), p.y.round()))
        .with_disambiguators(disambiguators)
}

fn disambiguators(descriptor: &ElementDescriptor) -> Disambiguators {
    let tag = descriptor.tag();
    Disambiguators {
        tag_name: (!tag.is_empty()).then_some(tag),
        input_type: descriptor.input_type_lower(),
        role: meaningful(&descriptor.role).map(str::to_string),
        id: meaningful(&descriptor.id).map(str::to_string),
        name: meaningful(&descriptor.name).map(str::to_string),
        position: Some(descriptor.position),
    }
}

pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
