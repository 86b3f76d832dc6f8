// Store configuration, loaded from todostore.yaml

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file name inside the data directory
pub const CONFIG_FILE: &str = "todostore.yaml";

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Files,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Where on-disk backends keep their data; `None` means the platform data dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub backend: Backend,
    pub tasks_key: String,
    pub lists_key: String,
    /// Prefix of the per-list keys written by older builds
    pub legacy_prefix: String,
    pub import_legacy_on_init: bool,
    /// Read each write back and re-issue it once if the stored value differs
    pub verify_writes: bool,
    /// Snapshot file rewritten after every successful save; relative paths
    /// are taken from the data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_export: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: Backend::default(),
            tasks_key: "TASKS_STORAGE_KEY".to_string(),
            lists_key: "LISTS_STORAGE_KEY".to_string(),
            legacy_prefix: "TASKS_".to_string(),
            import_legacy_on_init: true,
            verify_writes: false,
            auto_export: None,
        }
    }
}

impl StoreConfig {
    /// Load `todostore.yaml` from `dir`, falling back to defaults when absent
    ///
    /// The returned config always has `data_dir` set to `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE);

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read config file")?;
            serde_yaml::from_str::<StoreConfig>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            debug!(path = ?path, "No config file, using defaults");
            StoreConfig::default()
        };

        config.data_dir = Some(dir.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// Write this config to `todostore.yaml` in `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create data directory")?;
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(dir.join(CONFIG_FILE), yaml).context("Failed to write config file")?;
        Ok(())
    }

    /// Data directory, defaulting to `<platform data dir>/todostore`
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join("todostore"))
                .ok_or_else(|| eyre!("Could not determine platform data directory")),
        }
    }

    /// Where auto-export writes, or `None` when it is off
    pub fn auto_export_path(&self) -> Option<PathBuf> {
        let path = self.auto_export.as_ref()?;
        match &self.data_dir {
            Some(dir) if path.is_relative() => Some(dir.join(path)),
            _ => Some(path.clone()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.tasks_key.trim().is_empty() || self.lists_key.trim().is_empty() {
            return Err(eyre!("Storage keys cannot be empty"));
        }
        if self.tasks_key == self.lists_key {
            return Err(eyre!("tasks_key and lists_key must differ: {}", self.tasks_key));
        }
        if self.legacy_prefix.is_empty() {
            return Err(eyre!("legacy_prefix cannot be empty"));
        }
        if self.auto_export.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(eyre!("auto_export cannot be an empty path"));
        }
        Ok(())
    }

    /// List name encoded in a legacy per-list key, if `key` is one
    pub fn legacy_list_name<'a>(&self, key: &'a str) -> Option<&'a str> {
        if key == self.tasks_key || key == self.lists_key {
            return None;
        }
        key.strip_prefix(self.legacy_prefix.as_str()).filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::load(temp.path()).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.tasks_key, "TASKS_STORAGE_KEY");
        assert_eq!(config.data_dir.as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_load_partial_yaml() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "backend: files\nverify_writes: true\n").unwrap();

        let config = StoreConfig::load(temp.path()).unwrap();
        assert_eq!(config.backend, Backend::Files);
        assert!(config.verify_writes);
        assert_eq!(config.lists_key, "LISTS_STORAGE_KEY");
        assert!(config.import_legacy_on_init);
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig {
            backend: Backend::Memory,
            ..Default::default()
        };
        config.save(temp.path()).unwrap();

        let loaded = StoreConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.backend, Backend::Memory);
    }

    #[test]
    fn test_rejects_identical_keys() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "tasks_key: SAME\nlists_key: SAME\n").unwrap();
        assert!(StoreConfig::load(temp.path()).is_err());
    }

    #[test]
    fn test_auto_export_path() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::load(temp.path()).unwrap();
        assert_eq!(config.auto_export, None);
        assert_eq!(config.auto_export_path(), None);

        fs::write(temp.path().join(CONFIG_FILE), "auto_export: backend/save/savedata.json\n").unwrap();
        let config = StoreConfig::load(temp.path()).unwrap();
        assert_eq!(
            config.auto_export_path(),
            Some(temp.path().join("backend/save/savedata.json"))
        );

        let absolute = temp.path().join("elsewhere.json");
        let config = StoreConfig {
            auto_export: Some(absolute.clone()),
            ..config
        };
        assert_eq!(config.auto_export_path(), Some(absolute));
    }

    #[test]
    fn test_rejects_empty_auto_export() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "auto_export: \"\"\n").unwrap();
        assert!(StoreConfig::load(temp.path()).is_err());
    }

    #[test]
    fn test_legacy_list_name() {
        let config = StoreConfig::default();
        assert_eq!(config.legacy_list_name("TASKS_Groceries"), Some("Groceries"));
        assert_eq!(config.legacy_list_name("TASKS_STORAGE_KEY"), None);
        assert_eq!(config.legacy_list_name("LISTS_STORAGE_KEY"), None);
        assert_eq!(config.legacy_list_name("TASKS_"), None);
        assert_eq!(config.legacy_list_name("OTHER"), None);
    }
}
