use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RecorderError;
use crate::models::{Action, ActionScript};

/// Ordered, append-only action list backed by a YAML file.
///
/// Writes go to a sibling temp file that is renamed over the target, so a crash
/// mid-save leaves the previous version intact.
#[derive(Debug)]
pub struct ActionStore {
    path: PathBuf,
    script: ActionScript,
    next_index: u64,
    autosave: bool,
    dirty: bool,
}

impl ActionStore {
    pub fn create(path: impl Into<PathBuf>, script: ActionScript, autosave: bool) -> Self {
        let next_index = script.actions.last().map_or(1, |a| a.sequence_index + 1);
        Self {
            path: path.into(),
            script,
            next_index,
            autosave,
            dirty: true,
        }
    }

    /// Reads and validates an action list
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let path = path.into();
        let raw = tokio::fs::read_to_string(&path).await?;
        let script: ActionScript = serde_yaml::from_str(&raw)?;
        script.validate().map_err(RecorderError::InvalidScript)?;
        info!("Loaded {} actions from {}", script.actions.len(), path.display());

        let mut store = Self::create(path, script, false);
        store.dirty = false;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn script(&self) -> &ActionScript {
        &self.script
    }

    pub fn actions(&self) -> &[Action] {
        &self.script.actions
    }

    pub fn len(&self) -> usize {
        self.script.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.actions.is_empty()
    }

    /// Index the next appended action will get
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Assigns the next `sequence_index` and appends in memory. Call
    /// [`autosave`](Self::autosave) afterwards to persist.
    pub fn push(&mut self, mut action: Action) -> Result<&Action, RecorderError> {
        action.sequence_index = self.next_index;
        action
            .validate()
            .map_err(RecorderError::InvalidAction)?;
        self.next_index += 1;

        debug!("Appending action #{}: {}", action.sequence_index, action.describe());
        self.script.actions.push(action);
        self.dirty = true;

        let index = self.script.actions.len() - 1;
        Ok(&self.script.actions[index])
    }

    /// Saves unsaved changes when autosave is on
    pub async fn autosave(&mut self) -> Result<(), RecorderError> {
        if self.autosave && self.dirty {
            self.save().await?;
        }
        Ok(())
    }

    pub async fn save(&mut self) -> Result<(), RecorderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let yaml = serde_yaml::to_string(&self.script)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        self.dirty = false;
        debug!("Saved {} actions to {}", self.len(), self.path.display());
        Ok(())
    }

    /// Writes a PNG beside the action list; returns the reference stored in metadata
    pub async fn write_screenshot(&self, sequence_index: u64, png: &[u8]) -> Result<String, RecorderError> {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string());
        let dir_name = format!("{}_screenshots", stem);
        let file_name = format!("step_{:04}.png", sequence_index);

        let dir = match self.path.parent() {
            Some(parent) => parent.join(&dir_name),
            None => PathBuf::from(&dir_name),
        };
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), png).await?;

        Ok(format!("{}/{}", dir_name, file_name))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionKind, ActionMetadata, TargetDescriptor};

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("dom-replay-store-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn test_push_assigns_increasing_indices() {
        let path = temp_file("flow.yaml");
        let mut store = ActionStore::create(&path, ActionScript::new("flow", None), false);

        let first = store.push(Action::go_to("http://app/")).unwrap().sequence_index;
        let second = store
            .push(Action::click(TargetDescriptor::text("Entrar")))
            .unwrap()
            .sequence_index;
        assert_eq!((first, second), (1, 2));
        assert_eq!(store.next_index(), 3);

        // Autosave off: nothing reaches the disk until an explicit save
        store.autosave().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_invalid_action_is_rejected() {
        let mut store = ActionStore::create(temp_file("bad.yaml"), ActionScript::new("bad", None), false);
        let mut click = Action::click(TargetDescriptor::text("x"));
        click.target = None;
        assert!(matches!(store.push(click), Err(RecorderError::InvalidAction(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_keeps_metadata() {
        let path = temp_file("login.yaml");
        let mut store = ActionStore::create(&path, ActionScript::new("login", Some("http://app/".into())), true);
        store.push(Action::go_to("http://app/")).unwrap();

        let mut metadata = ActionMetadata {
            caption: Some("Fill the email".into()),
            ..Default::default()
        };
        metadata
            .extra
            .insert("voice".into(), serde_yaml::Value::String("pt-BR".into()));
        let mut typed = Action::type_text(TargetDescriptor::text("Email"), "a@b.c");
        typed.metadata = Some(metadata);
        store.push(typed).unwrap();
        store.autosave().await.unwrap();

        let loaded = ActionStore::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.actions()[1].kind, ActionKind::Type);
        let meta = loaded.actions()[1].metadata.as_ref().unwrap();
        assert_eq!(meta.caption.as_deref(), Some("Fill the email"));
        assert!(meta.extra.contains_key("voice"));
        assert!(!path.with_file_name("login.yaml.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_rejects_unordered_indices() {
        let path = temp_file("unordered.yaml");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let yaml = r#"
name: unordered
actions:
  - sequence_index: 2
    kind: go_to
    payload: "http://app/"
  - sequence_index: 1
    kind: wait
    payload: "100"
"#;
        tokio::fs::write(&path, yaml).await.unwrap();
        assert!(matches!(
            ActionStore::load(&path).await,
            Err(RecorderError::InvalidScript(_))
        ));
    }

    #[tokio::test]
    async fn test_screenshot_reference() {
        let path = temp_file("shots.yaml");
        let store = ActionStore::create(&path, ActionScript::new("shots", None), false);
        let reference = store.write_screenshot(3, b"\x89PNG").await.unwrap();
        assert_eq!(reference, "shots_screenshots/step_0003.png");
        assert!(path.parent().unwrap().join(&reference).exists());
    }
}
