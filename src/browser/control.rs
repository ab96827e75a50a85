use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::Position;

/// `document.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn parse(s: &str) -> Self {
        match s {
            "complete" => ReadyState::Complete,
            "interactive" => ReadyState::Interactive,
            _ => ReadyState::Loading,
        }
    }
}

/// What the recorder needs from a commanded browser: script evaluation and
/// injection, navigation, a ready predicate, and coordinate-based input.
///
/// Everything else (candidate scans, cursor overlay, the event queue) is built
/// on top of `evaluate`.
#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// Evaluate an expression in the current document and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Register a script that runs on every new document before page scripts
    async fn add_init_script(&self, script: &str) -> Result<()>;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn move_mouse(&self, point: Position) -> Result<()>;

    async fn click_at(&self, point: Position) -> Result<()>;

    /// Insert text at the focused element, as if typed
    async fn insert_text(&self, text: &str) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// PNG bytes of the viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;

    async fn ready_state(&self) -> Result<ReadyState> {
        let value = self.evaluate("document.readyState").await?;
        Ok(ReadyState::parse(value.as_str().unwrap_or("")))
    }
}
