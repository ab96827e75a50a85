pub mod control;
pub mod keys;
pub mod manager;

pub use control::{BrowserControl, ReadyState};
pub use keys::{key_definition, KeyDefinition};
pub use manager::{BrowserManager, LaunchOptions};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes a script result that is either a JSON string (`JSON.stringify`) or a
/// value returned by value
pub fn decode<T: DeserializeOwned>(value: &Value) -> Option<T> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Null => None,
        other => serde_json::from_value(other.clone()).ok(),
    }
}
