use anyhow::Result;
use directories::ProjectDirs;
use mdcallout::CalloutSettings;
use std::path::{Path, PathBuf};
use tokio::fs::try_exists;

const SETTINGS_FILE: &str = "callouts.json";

/// Where callout settings are persisted.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Store at the user's config location, honouring the
    /// `MARGINALIA_CONFIG_PATH` and `MARGINALIA_CONFIG_DIR` overrides.
    pub fn locate() -> Self {
        Self {
            path: Self::config_path(),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn load(&self) -> Result<CalloutSettings> {
        if let Some(config_path) = &self.path {
            if try_exists(config_path).await? {
                match tokio::fs::read_to_string(config_path).await {
                    Ok(content) => {
                        if content.trim().is_empty() {
                            log::warn!("Settings file is empty, creating new one");
                            return Ok(self.write_defaults().await);
                        }

                        match CalloutSettings::from_json_str(&content) {
                            Ok(settings) => {
                                log::info!(
                                    "Loaded {} callout mappings from: {}",
                                    settings.mappings.len(),
                                    config_path.display()
                                );
                                return Ok(settings);
                            }
                            Err(json_err) => {
                                log::error!("Failed to parse settings file: {}", json_err);

                                // Keep the broken file around for the user
                                let backup_path = config_path.with_extension("bak");
                                if let Err(e) = tokio::fs::copy(config_path, &backup_path).await {
                                    log::warn!("Failed to backup broken settings: {}", e);
                                } else {
                                    log::info!(
                                        "Backed up broken settings to: {}",
                                        backup_path.display()
                                    );
                                }

                                return Ok(self.write_defaults().await);
                            }
                        }
                    }
                    Err(io_err) => {
                        log::error!("Failed to read settings file: {}", io_err);
                        return Ok(CalloutSettings::default());
                    }
                }
            } else {
                log::info!("Settings file does not exist, creating default");
            }
        }

        Ok(self.write_defaults().await)
    }

    pub async fn save(&self, settings: &CalloutSettings) -> Result<()> {
        let Some(config_path) = &self.path else {
            log::debug!("No settings location, not persisting");
            return Ok(());
        };

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create settings directory: {} - {}",
                    parent.display(),
                    e
                )
            })?;
        }

        let content = settings
            .to_json_pretty()
            .map_err(|e| anyhow::anyhow!("Failed to serialize settings: {}", e))?;
        tokio::fs::write(config_path, content).await.map_err(|e| {
            anyhow::anyhow!(
                "Failed to write settings file: {} - {}",
                config_path.display(),
                e
            )
        })?;

        log::info!("Saved callout settings to: {}", config_path.display());
        Ok(())
    }

    async fn write_defaults(&self) -> CalloutSettings {
        let settings = CalloutSettings::default();
        if let Err(e) = self.save(&settings).await {
            log::warn!("Failed to write default settings: {}", e);
        }
        settings
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MARGINALIA_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("MARGINALIA_CONFIG_DIR") {
            return Some(PathBuf::from(dir).join(SETTINGS_FILE));
        }

        ProjectDirs::from("com", "marginalia", "marginalia")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdcallout::{CalloutMapping, MappingTable};
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn config_test_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[tokio::test]
    async fn test_missing_file_gets_defaults_written() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(SETTINGS_FILE);
        let store = SettingsStore::at(&path);

        let settings = store.load().await.unwrap();
        assert_eq!(settings, CalloutSettings::default());

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        let first = &value["mappings"][0];
        assert_eq!(first["prefix"], "!");
        assert_eq!(first["backgroundColor"], "rgba(255, 0, 0, 0.1)");
        assert_eq!(value["mappings"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_file_gets_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        tokio::fs::write(&path, "  \n").await.unwrap();

        let settings = SettingsStore::at(&path).load().await.unwrap();
        assert_eq!(settings.mappings.len(), 4);
    }

    #[tokio::test]
    async fn test_broken_file_is_backed_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let settings = SettingsStore::at(&path).load().await.unwrap();
        assert_eq!(settings, CalloutSettings::default());

        let backup = tokio::fs::read_to_string(path.with_extension("bak"))
            .await
            .unwrap();
        assert_eq!(backup, "{ not json");
    }

    #[tokio::test]
    async fn test_invalid_mappings_fall_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        tokio::fs::write(&path, r#"{"mappings": "nope"}"#).await.unwrap();

        let settings = SettingsStore::at(&path).load().await.unwrap();
        assert_eq!(settings.mappings, MappingTable::defaults());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::at(temp_dir.path().join(SETTINGS_FILE));

        let mut settings = CalloutSettings::default();
        settings
            .mappings
            .push(CalloutMapping::new('%', "🔥", "Hot Take", "#ff000022", "orange"));
        store.save(&settings).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.mappings.find_by_prefix('%').unwrap().label, "Hot Take");
    }

    #[test]
    fn test_locate_honours_env_overrides() {
        let _guard = config_test_lock().lock().unwrap();
        let previous_dir = std::env::var("MARGINALIA_CONFIG_DIR").ok();
        let previous_path = std::env::var("MARGINALIA_CONFIG_PATH").ok();

        std::env::remove_var("MARGINALIA_CONFIG_PATH");
        std::env::set_var("MARGINALIA_CONFIG_DIR", "/tmp/marginalia-test");
        assert_eq!(
            SettingsStore::locate().path(),
            Some(Path::new("/tmp/marginalia-test/callouts.json"))
        );

        std::env::set_var("MARGINALIA_CONFIG_PATH", "/tmp/elsewhere.json");
        assert_eq!(
            SettingsStore::locate().path(),
            Some(Path::new("/tmp/elsewhere.json"))
        );

        match previous_dir {
            Some(value) => std::env::set_var("MARGINALIA_CONFIG_DIR", value),
            None => std::env::remove_var("MARGINALIA_CONFIG_DIR"),
        }
        match previous_path {
            Some(value) => std::env::set_var("MARGINALIA_CONFIG_PATH", value),
            None => std::env::remove_var("MARGINALIA_CONFIG_PATH"),
        }
    }
}
