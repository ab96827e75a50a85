//! In-memory stand-in for Chrome: answers the recorder's scripts by their
//! marker comment and records every input it is asked to dispatch.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use dom_replay::browser::BrowserControl;
use dom_replay::config::RecorderConfig;
use dom_replay::models::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Navigate(String),
    Click(Position),
    Insert(String),
    Key(String),
    Close,
}

#[derive(Default)]
struct Document {
    url: String,
    installed: bool,
    epoch: Option<u64>,
    paused: bool,
    queue: Vec<Value>,
}

#[derive(Default)]
pub struct FakeBrowser {
    document: Mutex<Document>,
    init_registered: Mutex<bool>,
    candidates: Mutex<Vec<Value>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        let browser = Self::default();
        browser.document.lock().unwrap().url = "about:blank".into();
        browser
    }

    /// Page elements the candidate scan reports, in DOM order
    pub fn set_candidates(&self, candidates: Vec<Value>) {
        *self.candidates.lock().unwrap() = candidates;
    }

    /// Queues events the way the instrumentation would, stamped with the document epoch
    pub fn push_events(&self, events: Vec<Value>) {
        let mut document = self.document.lock().unwrap();
        if !document.installed || document.paused {
            return;
        }
        for mut event in events {
            if let Some(epoch) = document.epoch {
                event["epoch"] = json!(epoch);
            }
            document.queue.push(event);
        }
    }

    /// A navigation the user caused (link, form submit)
    pub fn page_navigated(&self, url: &str) {
        let installed = *self.init_registered.lock().unwrap();
        *self.document.lock().unwrap() = Document {
            url: url.to_string(),
            installed,
            ..Default::default()
        };
    }

    /// Events still waiting in the page queue
    pub fn queued(&self) -> usize {
        self.document.lock().unwrap().queue.len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<Position> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Click(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn candidate_rect(&self, script: &str) -> Value {
        let index = script
            .split("__domReplayCandidates || [])[")
            .nth(1)
            .and_then(|rest| rest.split(']').next())
            .and_then(|n| n.trim().parse::<usize>().ok());
        let candidates = self.candidates.lock().unwrap();
        match index.and_then(|i| candidates.get(i)) {
            Some(candidate) => Value::String(candidate["rect"].to_string()),
            None => Value::Null,
        }
    }
}

#[async_trait]
impl BrowserControl for FakeBrowser {
    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script.contains("document.readyState") && !script.contains("dom-replay:") {
            return Ok(json!("complete"));
        }

        let mut document = self.document.lock().unwrap();
        let value = if script.contains("dom-replay:install") {
            document.installed = true;
            json!(true)
        } else if script.contains("dom-replay:stamp") {
            if document.installed {
                let epoch = script
                    .split("ns.epoch = ")
                    .nth(1)
                    .and_then(|rest| rest.split(';').next())
                    .and_then(|n| n.trim().parse::<u64>().ok());
                document.epoch = epoch;
                json!(true)
            } else {
                json!(false)
            }
        } else if script.contains("dom-replay:drain") {
            let events: Vec<Value> = if document.installed {
                document.queue.drain(..).collect()
            } else {
                Vec::new()
            };
            let drained = json!({
                "present": document.installed,
                "epoch": document.epoch,
                "url": document.url,
                "events": events,
            });
            Value::String(drained.to_string())
        } else if script.contains("dom-replay:teardown") {
            document.installed = false;
            json!(true)
        } else if script.contains("dom-replay:pause") {
            document.paused = script.contains("paused = true");
            json!(true)
        } else if script.contains("dom-replay:scan") {
            Value::String(Value::Array(self.candidates.lock().unwrap().clone()).to_string())
        } else if script.contains("dom-replay:locate") {
            self.candidate_rect(script)
        } else if script.contains("dom-replay:prepare") {
            json!("cleared")
        } else if script.contains("dom-replay:") {
            json!(true)
        } else {
            Value::Null
        };
        Ok(value)
    }

    async fn add_init_script(&self, _script: &str) -> Result<()> {
        *self.init_registered.lock().unwrap() = true;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(Call::Navigate(url.to_string()));
        self.page_navigated(url);
        Ok(())
    }

    async fn move_mouse(&self, _point: Position) -> Result<()> {
        Ok(())
    }

    async fn click_at(&self, point: Position) -> Result<()> {
        self.record(Call::Click(point));
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        self.record(Call::Insert(text.to_string()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.record(Call::Key(key.to_string()));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&self) -> Result<()> {
        self.record(Call::Close);
        Ok(())
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("dom-replay-it-{}", uuid::Uuid::new_v4()))
}

/// Fast settings: no cursor travel, no pause between steps
pub fn test_config(output_dir: PathBuf) -> RecorderConfig {
    RecorderConfig {
        output_dir,
        step_delay: Duration::ZERO,
        cursor_travel: Duration::ZERO,
        ready_timeout: Duration::from_secs(2),
        step_timeout: Duration::from_secs(5),
        ..RecorderConfig::default()
    }
}

/// Polls `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn candidate(index: usize, tag: &str, text: &str, rect: (f64, f64, f64, f64)) -> Value {
    json!({
        "dom_index": index,
        "tag_name": tag,
        "text": text,
        "rect": { "x": rect.0, "y": rect.1, "width": rect.2, "height": rect.3 },
    })
}
