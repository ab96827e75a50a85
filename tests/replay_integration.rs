//! Read mode end to end: a stored action list is replayed against a fake page
//! whose elements no longer match the recording exactly.

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

use common::{candidate, temp_dir, test_config, Call, FakeBrowser};
use dom_replay::events::SessionEvent;
use dom_replay::models::{Position, RecorderState};
use dom_replay::recording::{Recorder, SessionOptions};

const LOGIN_SCRIPT: &str = r#"
version: "1.0"
name: login
start_url: http://app.test/login
actions:
  - sequence_index: 1
    kind: type
    target:
      strategy: placeholder
      value: E-mail
    payload: a@b.c
    metadata:
      caption: Fill in the e-mail
  - sequence_index: 2
    kind: click
    target:
      strategy: text
      value: Entrar
"#;

const FORGOT_SCRIPT: &str = r#"
name: forgot
start_url: http://app.test/login
actions:
  - sequence_index: 1
    kind: click
    target:
      strategy: text
      value: senha
  - sequence_index: 2
    kind: press
    payload: Escape
"#;

async fn write_script(dir: &Path, name: &str, yaml: &str) -> PathBuf {
    tokio::fs::create_dir_all(dir).await.unwrap();
    let path = dir.join(name);
    tokio::fs::write(&path, yaml).await.unwrap();
    path
}

fn login_page(browser: &FakeBrowser) {
    let mut email = candidate(2, "input", "", (0.0, 200.0, 200.0, 30.0));
    email["input_type"] = serde_json::json!("email");
    email["placeholder"] = serde_json::json!("E-mail");
    let mut submit = candidate(1, "button", "Entrar", (0.0, 100.0, 120.0, 40.0));
    submit["input_type"] = serde_json::json!("submit");

    browser.set_candidates(vec![
        candidate(0, "a", "Entrar", (0.0, 0.0, 80.0, 20.0)),
        submit,
        email,
    ]);
}

#[tokio::test]
async fn test_replay_prefers_submit_button_over_link() {
    let browser = Arc::new(FakeBrowser::new());
    login_page(&browser);
    let dir = temp_dir();
    let path = write_script(&dir, "login.yaml", LOGIN_SCRIPT).await;
    let (tx, mut rx) = broadcast::channel(64);

    let handle = Recorder::launch("rep-1", SessionOptions::read(&path, test_config(dir)), browser.clone(), tx)
        .await
        .unwrap();
    assert_eq!(handle.start().await.unwrap().state, RecorderState::Replaying);

    let status = handle.wait_stopped().await;
    assert_eq!(status.error, None);
    assert_eq!(status.reports.len(), 2);
    assert!(status.reports.iter().all(|r| r.success));
    assert!(status.reports[1].score.unwrap() >= 10);
    assert!(status.reports[1].matched.as_deref().unwrap().starts_with("<button>"));

    let calls = browser.calls();
    assert_eq!(calls[0], Call::Navigate("http://app.test/login".into()));
    assert!(calls.contains(&Call::Insert("a@b.c".into())));
    assert_eq!(
        browser.clicks(),
        vec![Position::new(100.0, 215.0), Position::new(60.0, 120.0)]
    );

    let mut resolved = 0;
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::MatchResolved { .. } = event {
            resolved += 1;
        }
    }
    assert_eq!(resolved, 2);
}

#[tokio::test]
async fn test_failed_step_stops_with_candidates() {
    let browser = Arc::new(FakeBrowser::new());
    browser.set_candidates(vec![candidate(0, "a", "senha", (0.0, 0.0, 80.0, 20.0))]);
    let dir = temp_dir();
    let path = write_script(&dir, "forgot.yaml", FORGOT_SCRIPT).await;
    let (tx, mut rx) = broadcast::channel(64);

    let handle = Recorder::launch("rep-2", SessionOptions::read(&path, test_config(dir)), browser.clone(), tx)
        .await
        .unwrap();
    handle.start().await.unwrap();

    let status = handle.wait_stopped().await;
    assert_eq!(status.reports.len(), 1);
    assert!(!status.reports[0].success);
    let error = status.error.unwrap();
    assert!(error.contains("Element not found"), "{}", error);
    assert!(browser.clicks().is_empty());
    assert!(!browser.calls().contains(&Call::Key("Escape".into())));

    let mut failed = None;
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::MatchFailed { target, considered, .. } = event {
            failed = Some((target, considered));
        }
    }
    let (target, considered) = failed.expect("match failure event");
    assert_eq!(target.value, "senha");
    assert_eq!(considered.len(), 1);
    assert!(considered[0].score < 1);
}

#[tokio::test]
async fn test_continue_on_error_runs_remaining_steps() {
    let browser = Arc::new(FakeBrowser::new());
    browser.set_candidates(vec![candidate(0, "a", "senha", (0.0, 0.0, 80.0, 20.0))]);
    let dir = temp_dir();
    let path = write_script(&dir, "forgot.yaml", FORGOT_SCRIPT).await;
    let mut config = test_config(dir);
    config.continue_on_error = true;
    let (tx, _rx) = broadcast::channel(64);

    let handle = Recorder::launch("rep-3", SessionOptions::read(&path, config), browser.clone(), tx)
        .await
        .unwrap();
    handle.start().await.unwrap();

    let status = handle.wait_stopped().await;
    assert_eq!(status.error, None);
    let outcomes: Vec<bool> = status.reports.iter().map(|r| r.success).collect();
    assert_eq!(outcomes, vec![false, true]);
    assert!(browser.calls().contains(&Call::Key("Escape".into())));
}

#[tokio::test]
async fn test_direct_type_uses_field_alternates() {
    let browser = Arc::new(FakeBrowser::new());
    login_page(&browser);
    let dir = temp_dir();
    // Never started: direct commands also work while idle
    let path = write_script(&dir, "empty.yaml", "name: empty\nactions: []\n").await;
    let (tx, _rx) = broadcast::channel(64);

    let handle = Recorder::launch("rep-4", SessionOptions::read(&path, test_config(dir)), browser.clone(), tx)
        .await
        .unwrap();

    let outcome = handle.type_text("x@y.z", "E-mail").await.unwrap();
    assert_eq!(outcome.state, RecorderState::Idle);
    assert!(outcome.detail.unwrap().starts_with("<input>"));
    assert!(browser.calls().contains(&Call::Insert("x@y.z".into())));

    let outcome = handle.press("Enter").await.unwrap();
    assert_eq!(outcome.detail, None);
    assert_eq!(browser.calls().last(), Some(&Call::Key("Enter".into())));

    assert_err!(handle.click("Cadastrar").await);
    assert_ok!(handle.exit().await);
}

#[tokio::test]
async fn test_invalid_script_is_rejected_before_start() {
    let browser = Arc::new(FakeBrowser::new());
    let dir = temp_dir();
    let yaml = "name: broken\nactions:\n  - sequence_index: 1\n    kind: click\n";
    let path = write_script(&dir, "broken.yaml", yaml).await;
    let (tx, _rx) = broadcast::channel(8);

    let result = Recorder::launch("rep-5", SessionOptions::read(&path, test_config(dir)), browser, tx).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_long_wait_is_not_cut_by_step_timeout() {
    let browser = Arc::new(FakeBrowser::new());
    let dir = temp_dir();
    let yaml = "name: idle\nactions:\n  - sequence_index: 1\n    kind: wait\n    payload: \"400\"\n  - sequence_index: 2\n    kind: press\n    payload: Tab\n";
    let path = write_script(&dir, "idle.yaml", yaml).await;
    let mut config = test_config(dir);
    config.step_timeout = std::time::Duration::from_millis(200);
    let (tx, _rx) = broadcast::channel(16);

    let handle = Recorder::launch("rep-6", SessionOptions::read(&path, config), browser.clone(), tx)
        .await
        .unwrap();
    handle.start().await.unwrap();

    let status = handle.wait_stopped().await;
    assert_eq!(status.error, None);
    assert_eq!(status.reports.len(), 2);
    assert!(status.reports.iter().all(|r| r.success), "{:#?}", status.reports);
    assert!(status.reports[0].duration_ms >= 400);
    assert!(browser.calls().contains(&Call::Key("Tab".into())));
}
