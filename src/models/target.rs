use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::Position;

/// How a target was identified, in matching priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Text,
    Label,
    Placeholder,
    Aria,
    TypeContext,
    /// name/id attribute substring (input fields only)
    Attribute,
    Position,
}

impl Strategy {
    /// Strategies that look up form fields rather than clickable text
    pub fn is_field_lookup(&self) -> bool {
        matches!(
            self,
            Strategy::Label
                | Strategy::Placeholder
                | Strategy::Aria
                | Strategy::TypeContext
                | Strategy::Attribute
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Text => "text",
            Strategy::Label => "label",
            Strategy::Placeholder => "placeholder",
            Strategy::Aria => "aria",
            Strategy::TypeContext => "type_context",
            Strategy::Attribute => "attribute",
            Strategy::Position => "position",
        }
    }
}

/// Secondary facts kept alongside the primary value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Disambiguators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Disambiguators {
    pub fn is_empty(&self) -> bool {
        *self == Disambiguators::default()
    }
}

/// Canonical, serializable identity of an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub strategy: Strategy,
    pub value: String,
    #[serde(default, skip_serializing_if = "Disambiguators::is_empty")]
    pub disambiguators: Disambiguators,
}

impl TargetDescriptor {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            disambiguators: Disambiguators::default(),
        }
    }

    /// Plain text target, used by direct `click <text>` commands
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(Strategy::Text, value)
    }

    pub fn with_disambiguators(mut self, disambiguators: Disambiguators) -> Self {
        self.disambiguators = disambiguators;
        self
    }

    /// Two descriptors name the same element when strategy and value agree and
    /// their id/name attributes (if both have one) do not contradict.
    pub fn same_element(&self, other: &TargetDescriptor) -> bool {
        if self.strategy != other.strategy || self.value != other.value {
            return false;
        }
        let a = &self.disambiguators;
        let b = &other.disambiguators;
        let agrees = |x: &Option<String>, y: &Option<String>| match (x, y) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        };
        agrees(&a.id, &b.id) && agrees(&a.name, &b.name)
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}='{}'", self.strategy.as_str(), self.value)?;
        if let Some(tag) = &self.disambiguators.tag_name {
            write!(f, " <{}>", tag)?;
        }
        Ok(())
    }
}
