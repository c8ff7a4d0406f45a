use serde::{Deserialize, Serialize};

/// User-facing settings snapshot as persisted by the settings provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub default_to_tile_view_for_local_source: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AppSettings = toml::from_str("").expect("empty settings");
        assert_eq!(settings, AppSettings::default());

        let settings: AppSettings =
            toml::from_str("default_to_tile_view_for_local_source = true").expect("settings");
        assert!(settings.default_to_tile_view_for_local_source);
    }
}
