use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::{ControllerOptions, DEFAULT_MAX_DRAFT_CHARS, ReplyTiming};

pub const SETTINGS_DIRECTORY_NAME: &str = "chatbox";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DATABASE_FILE_NAME: &str = "chatbox.db";
pub const ENV_PREFIX: &str = "CHATBOX_";

pub const DEFAULT_THINKING_DELAY_MS: u64 = 2_000;
pub const DEFAULT_REVEAL_INTERVAL_MS: u64 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// SQLite database holding sessions and transcripts.
    pub storage_path: PathBuf,
    pub thinking_delay_ms: u64,
    pub reveal_interval_ms: u64,
    pub max_draft_chars: usize,
    /// Replaces the built-in reply catalog when set.
    pub catalog_path: Option<PathBuf>,
    /// Makes card selection reproducible.
    pub random_seed: Option<u64>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            thinking_delay_ms: DEFAULT_THINKING_DELAY_MS,
            reveal_interval_ms: DEFAULT_REVEAL_INTERVAL_MS,
            max_draft_chars: DEFAULT_MAX_DRAFT_CHARS,
            catalog_path: None,
            random_seed: None,
        }
    }
}

impl ChatSettings {
    pub fn normalized(mut self) -> Self {
        if self.thinking_delay_ms == 0 {
            self.thinking_delay_ms = DEFAULT_THINKING_DELAY_MS;
        }
        if self.reveal_interval_ms == 0 {
            self.reveal_interval_ms = DEFAULT_REVEAL_INTERVAL_MS;
        }
        if self.max_draft_chars == 0 {
            self.max_draft_chars = DEFAULT_MAX_DRAFT_CHARS;
        }
        if self.storage_path.as_os_str().is_empty() {
            self.storage_path = default_storage_path();
        }
        self.catalog_path = self
            .catalog_path
            .filter(|path| !path.as_os_str().is_empty());
        self
    }

    pub fn timing(&self) -> ReplyTiming {
        ReplyTiming {
            thinking_delay: Duration::from_millis(self.thinking_delay_ms),
            reveal_interval: Duration::from_millis(self.reveal_interval_ms),
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            timing: self.timing(),
            max_draft_chars: self.max_draft_chars,
        }
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ChatSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".chatbox"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ChatSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    /// Re-reads the settings file and environment.
    pub fn reload(&self) -> Arc<ChatSettings> {
        let settings = Arc::new(Self::load_from_disk(&self.config_path));
        self.settings.store(settings.clone());
        tracing::info!("reloaded settings from {:?}", self.config_path);
        settings
    }

    /// Writes the current settings when no settings file exists yet.
    pub fn ensure_persisted(&self) -> Result<(), SettingsError> {
        if self.config_path.exists() {
            return Ok(());
        }
        self.persist(&self.settings())
    }

    fn load_from_disk(path: &Path) -> ChatSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let figment = Figment::from(Serialized::defaults(ChatSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX));

        match figment.extract::<ChatSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ChatSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ChatSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
        .unwrap_or_else(|| PathBuf::from(".chatbox"))
        .join(DATABASE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("chatbox-settings-{}-{name}", std::process::id()))
            .join(SETTINGS_FILE_NAME)
    }

    #[test]
    fn missing_file_yields_defaults_and_gets_written_once() {
        let path = scratch_path("defaults");
        let _ = std::fs::remove_file(&path);

        let store = SettingsStore::new(path.clone());
        assert_eq!(store.settings().thinking_delay_ms, DEFAULT_THINKING_DELAY_MS);
        assert_eq!(store.settings().reveal_interval_ms, DEFAULT_REVEAL_INTERVAL_MS);

        store.ensure_persisted().unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = SettingsStore::new(path.clone());
        assert_eq!(reopened.settings(), store.settings());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_files_merge_over_defaults() {
        let path = scratch_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "reveal_interval_ms": 0, "random_seed": 7 }"#).unwrap();

        let store = SettingsStore::new(path.clone());
        let settings = store.settings();
        assert_eq!(settings.reveal_interval_ms, DEFAULT_REVEAL_INTERVAL_MS);
        assert_eq!(settings.random_seed, Some(7));
        assert_eq!(settings.max_draft_chars, DEFAULT_MAX_DRAFT_CHARS);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn zero_delays_fall_back_to_defaults() {
        let settings = ChatSettings {
            thinking_delay_ms: 0,
            reveal_interval_ms: 0,
            max_draft_chars: 0,
            ..ChatSettings::default()
        }
        .normalized();

        assert_eq!(settings.thinking_delay_ms, DEFAULT_THINKING_DELAY_MS);
        assert_eq!(settings.reveal_interval_ms, DEFAULT_REVEAL_INTERVAL_MS);
        assert_eq!(settings.max_draft_chars, DEFAULT_MAX_DRAFT_CHARS);
    }

    #[test]
    fn update_persists_and_reload_picks_up_edits() {
        let path = scratch_path("reload");
        let _ = std::fs::remove_file(&path);
        let store = SettingsStore::new(path.clone());

        let mut settings = (*store.settings()).clone();
        settings.thinking_delay_ms = 10;
        store.update(settings).unwrap();
        assert_eq!(
            store.settings().timing().thinking_delay,
            Duration::from_millis(10)
        );

        std::fs::write(&path, r#"{ "thinking_delay_ms": 500 }"#).unwrap();
        assert_eq!(store.reload().thinking_delay_ms, 500);
        assert_eq!(store.settings().thinking_delay_ms, 500);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn malformed_files_fall_back_to_defaults() {
        let path = scratch_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path.clone());
        assert_eq!(store.settings().max_draft_chars, DEFAULT_MAX_DRAFT_CHARS);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
