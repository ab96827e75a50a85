//! Write mode end to end: page events drained from a fake browser are folded
//! into actions and persisted as YAML.

mod common;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

use common::{candidate, eventually, now_millis, temp_dir, test_config, Call, FakeBrowser};
use dom_replay::browser::BrowserControl;
use dom_replay::capture::InjectionRetry;
use dom_replay::events::SessionEvent;
use dom_replay::models::Position;
use dom_replay::models::{ActionKind, RecorderState, Strategy};
use dom_replay::recording::{Recorder, SessionOptions};
use dom_replay::store::ActionStore;

const LOGIN_URL: &str = "http://app.test/login";

fn email_field() -> Value {
    json!({ "tag_name": "input", "input_type": "email", "placeholder": "E-mail", "position": { "x": 100, "y": 50 } })
}

fn password_field() -> Value {
    json!({ "tag_name": "input", "input_type": "password", "label": "Senha", "position": { "x": 100, "y": 90 } })
}

fn submit_button() -> Value {
    json!({ "tag_name": "button", "input_type": "submit", "text": "Entrar", "position": { "x": 100, "y": 130 } })
}

fn event(kind: &str, timestamp: i64, element: Value) -> Value {
    json!({ "kind": kind, "timestamp": timestamp, "element": element })
}

#[tokio::test]
async fn test_login_flow_is_folded_into_four_actions() {
    let browser = Arc::new(FakeBrowser::new());
    let dir = temp_dir();
    let path = dir.join("login.yaml");
    let options = SessionOptions::write("login", Some(LOGIN_URL.to_string()), test_config(dir.clone()))
        .with_output_path(&path);
    let (tx, mut rx) = broadcast::channel(64);

    let handle = Recorder::launch("rec-1", options, browser.clone(), tx).await.unwrap();
    assert_eq!(handle.start().await.unwrap().state, RecorderState::Recording);
    assert_eq!(browser.calls().first(), Some(&Call::Navigate(LOGIN_URL.to_string())));

    let t = now_millis();
    let mut input_a = event("input", t, email_field());
    input_a["value"] = json!("a");
    let mut input_ab = event("input", t + 10, email_field());
    input_ab["value"] = json!("ab");
    let mut password = event("input", t + 20, password_field());
    password["value"] = json!("s3cret");
    let mut enter = event("keydown", t + 30, password_field());
    enter["key"] = json!("Enter");
    enter["nearby_controls"] = json!([submit_button()]);
    // The browser's own click from the implicit form submission
    let synthetic_click = event("click", t + 35, submit_button());

    browser.push_events(vec![input_a, input_ab, password, enter, synthetic_click]);
    assert!(eventually(|| handle.status().action_count == 4).await);

    // Form submission lands on the next page
    browser.page_navigated("http://app.test/home");
    assert!(eventually(|| handle.status().navigation_epoch == 2).await);

    let outcome = handle.exit().await.unwrap();
    assert_eq!(outcome.state, RecorderState::Stopped);

    let store = ActionStore::load(&path).await.unwrap();
    let actions = store.actions();
    assert_eq!(actions.len(), 4, "{:#?}", actions);

    assert_eq!(actions[0].kind, ActionKind::GoTo);
    assert_eq!(actions[0].payload.as_deref(), Some(LOGIN_URL));

    assert_eq!(actions[1].kind, ActionKind::Type);
    let email = actions[1].target.as_ref().unwrap();
    assert_eq!((email.strategy, email.value.as_str()), (Strategy::Placeholder, "E-mail"));
    assert_eq!(actions[1].payload.as_deref(), Some("ab"));

    assert_eq!(actions[2].kind, ActionKind::Type);
    let senha = actions[2].target.as_ref().unwrap();
    assert_eq!((senha.strategy, senha.value.as_str()), (Strategy::Label, "Senha"));
    assert_eq!(actions[2].payload.as_deref(), Some("s3cret"));

    assert_eq!(actions[3].kind, ActionKind::Click);
    let button = actions[3].target.as_ref().unwrap();
    assert_eq!((button.strategy, button.value.as_str()), (Strategy::Text, "Entrar"));

    let indices: Vec<u64> = actions.iter().map(|a| a.sequence_index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);

    let mut recorded = 0;
    let mut transitions = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::ActionRecorded { .. } => recorded += 1,
            SessionEvent::StateChanged { from, to, .. } => transitions.push((from, to)),
            _ => {}
        }
    }
    assert_eq!(recorded, 4);
    assert_eq!(
        transitions,
        vec![
            (RecorderState::Idle, RecorderState::Recording),
            (RecorderState::Recording, RecorderState::Stopped),
        ]
    );
    assert!(eventually(|| browser.calls().contains(&Call::Close)).await);
}

#[tokio::test]
async fn test_pause_drops_events_and_exit_flushes_pending_input() {
    let browser = Arc::new(FakeBrowser::new());
    let dir = temp_dir();
    let path = dir.join("paused.yaml");
    let options = SessionOptions::write("paused", Some(LOGIN_URL.to_string()), test_config(dir.clone()))
        .with_output_path(&path);
    let (tx, _rx) = broadcast::channel(64);

    let handle = Recorder::launch("rec-2", options, browser.clone(), tx).await.unwrap();
    handle.start().await.unwrap();
    assert!(eventually(|| handle.status().navigation_epoch == 1).await);

    assert_eq!(handle.pause().await.unwrap().state, RecorderState::Paused);
    let t = now_millis();
    let mut ignored = event("input", t, email_field());
    ignored["value"] = json!("ignored");
    browser.push_events(vec![ignored, event("blur", t + 5, email_field())]);
    assert!(eventually(|| browser.queued() == 0).await);

    assert_eq!(handle.resume().await.unwrap().state, RecorderState::Recording);
    let mut typed = event("input", now_millis(), password_field());
    typed["value"] = json!("kept");
    browser.push_events(vec![typed]);
    assert!(eventually(|| handle.status().has_pending_input).await);

    // No blur: exit must still finalize the field
    handle.exit().await.unwrap();

    let store = ActionStore::load(&path).await.unwrap();
    let kinds: Vec<ActionKind> = store.actions().iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActionKind::GoTo, ActionKind::Type]);
    assert_eq!(store.actions()[1].payload.as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_direct_click_is_not_recorded() {
    let browser = Arc::new(FakeBrowser::new());
    browser.set_candidates(vec![candidate(0, "a", "Ajuda", (10.0, 10.0, 60.0, 20.0))]);
    let dir = temp_dir();
    let path = dir.join("direct.yaml");
    let options = SessionOptions::write("direct", Some(LOGIN_URL.to_string()), test_config(dir.clone()))
        .with_output_path(&path);
    let (tx, _rx) = broadcast::channel(64);

    let handle = Recorder::launch("rec-3", options, browser.clone(), tx).await.unwrap();
    handle.start().await.unwrap();

    let outcome = handle.click("Ajuda").await.unwrap();
    assert_eq!(outcome.state, RecorderState::Recording);
    assert!(outcome.detail.unwrap().contains("Ajuda"));
    assert_eq!(browser.clicks().len(), 1);

    handle.exit().await.unwrap();
    let store = ActionStore::load(&path).await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.actions()[0].kind, ActionKind::GoTo);
}

#[tokio::test]
async fn test_commands_after_exit_are_rejected() {
    let browser = Arc::new(FakeBrowser::new());
    let dir = temp_dir();
    let options = SessionOptions::write("closed", None, test_config(dir.clone())).with_output_path(dir.join("c.yaml"));
    let (tx, _rx) = broadcast::channel(16);

    let handle = Recorder::launch("rec-4", options, browser, tx).await.unwrap();
    assert_err!(handle.resume().await);
    assert_ok!(handle.start().await);
    assert_err!(handle.start().await);
    assert_ok!(handle.exit().await);

    let status = handle.wait_stopped().await;
    assert_eq!(status.state, RecorderState::Stopped);
    assert_err!(handle.save().await);
}

/// Fake page with slow screenshots and an instrumentation install that can be broken
struct SlowPage {
    page: FakeBrowser,
    screenshot_delay: Duration,
    screenshot_started: AtomicBool,
    install_broken: AtomicBool,
}

impl SlowPage {
    fn new(screenshot_delay: Duration) -> Self {
        Self {
            page: FakeBrowser::new(),
            screenshot_delay,
            screenshot_started: AtomicBool::new(false),
            install_broken: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl BrowserControl for SlowPage {
    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script.contains("dom-replay:install") && self.install_broken.load(Ordering::SeqCst) {
            anyhow::bail!("Cannot find context with specified id");
        }
        self.page.evaluate(script).await
    }

    async fn add_init_script(&self, script: &str) -> Result<()> {
        self.page.add_init_script(script).await
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.navigate(url).await
    }

    async fn move_mouse(&self, point: Position) -> Result<()> {
        self.page.move_mouse(point).await
    }

    async fn click_at(&self, point: Position) -> Result<()> {
        self.page.click_at(point).await
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        self.page.insert_text(text).await
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.page.press_key(key).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.screenshot_started.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.screenshot_delay).await;
        self.page.screenshot().await
    }

    async fn close(&self) -> Result<()> {
        self.page.close().await
    }
}

#[tokio::test]
async fn test_exit_during_screenshot_keeps_drained_click() {
    let browser = Arc::new(SlowPage::new(Duration::from_millis(300)));
    let dir = temp_dir();
    let path = dir.join("slow.yaml");
    let mut config = test_config(dir.clone());
    config.screenshots = true;
    let options = SessionOptions::write("slow", None, config).with_output_path(&path);
    let (tx, _rx) = broadcast::channel(16);

    let handle = Recorder::launch("rec-5", options, browser.clone(), tx).await.unwrap();
    handle.start().await.unwrap();

    let save = json!({ "tag_name": "button", "text": "Salvar", "position": { "x": 40, "y": 40 } });
    browser.page.push_events(vec![event("click", now_millis(), save)]);
    assert!(eventually(|| browser.screenshot_started.load(Ordering::SeqCst)).await);
    assert_eq!(browser.page.queued(), 0);

    handle.exit().await.unwrap();

    let store = ActionStore::load(&path).await.unwrap();
    let kinds: Vec<ActionKind> = store.actions().iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActionKind::Click]);
    let metadata = store.actions()[0].metadata.as_ref().unwrap();
    assert_eq!(metadata.screenshot_ref.as_deref(), Some("slow_screenshots/step_0001.png"));
}

#[tokio::test]
async fn test_repeated_reinjection_failures_stop_the_session() {
    let browser = Arc::new(SlowPage::new(Duration::ZERO));
    let dir = temp_dir();
    let mut config = test_config(dir.clone());
    config.injection = InjectionRetry {
        max_attempts: 2,
        backoff: Duration::from_millis(1),
    };
    let options = SessionOptions::write("broken", None, config).with_output_path(dir.join("broken.yaml"));
    let (tx, _rx) = broadcast::channel(16);

    let handle = Recorder::launch("rec-6", options, browser.clone(), tx).await.unwrap();
    handle.start().await.unwrap();

    browser.install_broken.store(true, Ordering::SeqCst);
    browser.page.page_navigated("http://app.test/next");

    let status = handle.wait_stopped().await;
    assert_eq!(status.state, RecorderState::Stopped);
    let error = status.error.unwrap();
    assert!(error.contains("could not be installed after 2 attempts"), "{}", error);
    assert!(eventually(|| browser.page.calls().contains(&Call::Close)).await);
}
