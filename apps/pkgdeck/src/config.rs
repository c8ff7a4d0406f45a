use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use package_core::{ControllerConfig, DEFAULT_BOOTSTRAP_PACKAGE_ID};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "pkgdeck.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inventory_path: PathBuf,
    pub settings_path: PathBuf,
    pub bootstrap_package_id: String,
    pub command_queue_capacity: usize,
    pub event_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let controller = ControllerConfig::default();
        Self {
            inventory_path: "./data/inventory.json".into(),
            settings_path: "./data/settings.toml".into(),
            bootstrap_package_id: DEFAULT_BOOTSTRAP_PACKAGE_ID.into(),
            command_queue_capacity: controller.command_queue_capacity,
            event_capacity: controller.event_capacity,
        }
    }
}

impl Settings {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            bootstrap_package_id: self.bootstrap_package_id.clone(),
            command_queue_capacity: self.command_queue_capacity,
            event_capacity: self.event_capacity,
        }
    }
}

/// Defaults, then `pkgdeck.toml` (or `path`, which must then exist), then `APP__*` variables.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    load_settings_with(path, app_environment())
}

fn app_environment() -> Environment {
    Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
}

fn load_settings_with(path: Option<&Path>, environment: Environment) -> Result<Settings> {
    let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

    Config::builder()
        .add_source(
            File::new(&file.to_string_lossy(), FileFormat::Toml).required(path.is_some()),
        )
        .add_source(environment)
        .build()
        .with_context(|| format!("failed to read configuration from '{}'", file.display()))?
        .try_deserialize()
        .context("invalid pkgdeck configuration")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        app_environment().source(Some(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn missing_default_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let absent = dir.path().join("nowhere").join(DEFAULT_CONFIG_FILE);

        // an absent implicit file is fine, an absent explicit one is not
        let err = load_settings_with(Some(&absent), environment(&[])).expect_err("required file");
        assert!(err.to_string().contains("nowhere"));

        let settings = load_settings_with(None, environment(&[])).expect("defaults");
        assert_eq!(settings.bootstrap_package_id, DEFAULT_BOOTSTRAP_PACKAGE_ID);
        assert_eq!(settings.event_capacity, 1024);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            "inventory_path = \"/srv/pkg/inventory.json\"\nbootstrap_package_id = \"pkgdeck.portable\"\n",
        )
        .expect("write config");

        let settings = load_settings_with(Some(&path), environment(&[])).expect("settings");
        assert_eq!(settings.inventory_path, PathBuf::from("/srv/pkg/inventory.json"));
        assert_eq!(settings.bootstrap_package_id, "pkgdeck.portable");
        assert_eq!(settings.settings_path, Settings::default().settings_path);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "event_capacity = 16\n").expect("write config");

        let settings = load_settings_with(
            Some(&path),
            environment(&[
                ("APP__EVENT_CAPACITY", "64"),
                ("APP__SETTINGS_PATH", "/etc/pkgdeck/settings.toml"),
            ]),
        )
        .expect("settings");
        assert_eq!(settings.event_capacity, 64);
        assert_eq!(settings.settings_path, PathBuf::from("/etc/pkgdeck/settings.toml"));

        let controller = settings.controller_config();
        assert_eq!(controller.event_capacity, 64);
        assert_eq!(controller.bootstrap_package_id, DEFAULT_BOOTSTRAP_PACKAGE_ID);
    }
}
