use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use package_core::SettingsProvider;
use shared::settings::AppSettings;
use tokio::sync::broadcast;
use tracing::debug;

/// [`AppSettings`] persisted as TOML. Saving broadcasts the new value to subscribers.
pub struct SettingsFile {
    path: PathBuf,
    current: Mutex<AppSettings>,
    changes: broadcast::Sender<AppSettings>,
}

impl SettingsFile {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str(&raw)
                .with_context(|| format!("failed to parse settings '{}'", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file; using defaults");
                AppSettings::default()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings '{}'", path.display()))
            }
        };

        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            path,
            current: Mutex::new(settings),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, settings: AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory '{}'", parent.display())
            })?;
        }
        let raw = toml::to_string_pretty(&settings)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write settings '{}'", self.path.display()))?;

        if let Ok(mut current) = self.current.lock() {
            *current = settings.clone();
        }
        let _ = self.changes.send(settings);
        Ok(())
    }
}

impl SettingsProvider for SettingsFile {
    fn settings(&self) -> AppSettings {
        self.current
            .lock()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }

    fn subscribe(&self) -> broadcast::Receiver<AppSettings> {
        self.changes.subscribe()
    }
}
