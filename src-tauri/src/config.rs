use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{CatalogSource, EndpointError, OllamaEndpoint, DEFAULT_OLLAMA_URL};
use crate::models::{HealthIntervals, ModelSelector};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize config: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config store error: {0}")]
    Store(String),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Type-safe configuration key that associates a key name with its value type
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T> {
    name: &'static str,
    _phantom: PhantomData<T>,
}

impl<T> ConfigKey<T> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    pub fn key_name(&self) -> &'static str {
        self.name
    }
}

// ===== App Configuration =====

/// App configuration (stored locally)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Base URL of the Ollama service
    pub ollama_url: String,
    /// Health probe interval while the service is unreachable
    pub health_interval_offline_secs: u64,
    /// Health probe interval once the service is up
    pub health_interval_online_secs: u64,
    /// Available-models catalog; the bundled one when unset
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            health_interval_offline_secs: 10,
            health_interval_online_secs: 60,
            catalog_path: None,
        }
    }
}

impl AppConfig {
    pub fn ollama_endpoint(&self) -> Result<OllamaEndpoint, ConfigError> {
        Ok(OllamaEndpoint::parse(&self.ollama_url)?)
    }

    pub fn health_intervals(&self) -> HealthIntervals {
        HealthIntervals {
            offline: std::time::Duration::from_secs(self.health_interval_offline_secs),
            online: std::time::Duration::from_secs(self.health_interval_online_secs),
        }
    }

    pub fn catalog_source(&self) -> CatalogSource {
        match &self.catalog_path {
            Some(path) => CatalogSource::File(path.clone()),
            None => CatalogSource::Bundled,
        }
    }
}

impl ConfigKey<AppConfig> {
    pub const APP: Self = Self::new("appConfig");
}

// ===== Model Configuration =====

/// Model selection, kept across restarts
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Selected chat model, e.g. "llama3.2:3b"
    #[serde(alias = "active_model")]
    pub active_model: Option<ModelSelector>,
}

impl ConfigKey<ModelConfig> {
    pub const MODEL: Self = Self::new("modelConfig");
}

// ===== Type-Safe Config Store =====

pub trait ConfigStore: Send + Sync + 'static {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T>;
    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError>;
    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError>;
}

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Config store persisted as a single JSON object on disk
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    data: Mutex<JsonMap>,
}

impl FileConfigStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();

        let data = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => JsonMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {:?}, starting empty", path);
                JsonMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, data: &JsonMap) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
        let value = self.data.lock().unwrap().get(key.key_name()).cloned()?;
        match serde_json::from_value(value) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Ignoring unreadable config '{}': {}", key.key_name(), e);
                None
            }
        }
    }

    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError> {
        let val = serde_json::to_value(value)?;
        let mut data = self.data.lock().unwrap();
        data.insert(key.key_name().to_string(), val);
        self.save(&data)
    }

    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError> {
        let mut data = self.data.lock().unwrap();
        if data.remove(key.key_name()).is_some() {
            self.save(&data)?;
        }
        Ok(())
    }
}

/// Type-safe configuration store that wraps the Tauri plugin store
#[cfg(feature = "desktop")]
#[derive(Clone)]
pub struct TauriConfigStore {
    store: std::sync::Arc<tauri_plugin_store::Store<tauri::Wry>>,
}

#[cfg(feature = "desktop")]
impl TauriConfigStore {
    pub fn new(store: std::sync::Arc<tauri_plugin_store::Store<tauri::Wry>>) -> Self {
        Self { store }
    }
}

#[cfg(feature = "desktop")]
impl ConfigStore for TauriConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
        self.store
            .get(key.key_name())
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError> {
        let val = serde_json::to_value(value)?;
        self.store.set(key.key_name(), val);
        self.store
            .save()
            .map_err(|e| ConfigError::Store(e.to_string()))
    }

    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError> {
        self.store.delete(key.key_name());
        self.store
            .save()
            .map_err(|e| ConfigError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Simple in-memory mock store for testing
    struct MockConfigStore {
        data: Mutex<HashMap<String, serde_json::Value>>,
    }

    impl MockConfigStore {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    impl ConfigStore for MockConfigStore {
        fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
            self.data
                .lock()
                .unwrap()
                .get(key.key_name())
                .and_then(|v| serde_json::from_value(v.clone()).ok())
        }

        fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError> {
            let val = serde_json::to_value(value)?;
            self.data
                .lock()
                .unwrap()
                .insert(key.key_name().to_string(), val);
            Ok(())
        }

        fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError> {
            self.data.lock().unwrap().remove(key.key_name());
            Ok(())
        }
    }

    #[test]
    fn test_app_config_store() {
        let test_cases = vec![
            ("AppConfig with defaults", ConfigKey::APP, AppConfig::default()),
            (
                "AppConfig with custom catalog",
                ConfigKey::APP,
                AppConfig {
                    ollama_url: "http://10.0.0.2:11434".to_string(),
                    health_interval_offline_secs: 5,
                    health_interval_online_secs: 120,
                    catalog_path: Some(PathBuf::from("/tmp/models.json")),
                },
            ),
        ];

        for (description, key, config) in test_cases {
            let store = MockConfigStore::new();
            test_config_lifecycle(&store, &key, config, description);
        }
    }

    #[test]
    fn test_model_config_store() {
        let test_cases = vec![
            (
                "ModelConfig with model selected",
                ConfigKey::MODEL,
                ModelConfig {
                    active_model: Some(ModelSelector::new("llama3.2", "3b")),
                },
            ),
            (
                "ModelConfig with no model",
                ConfigKey::MODEL,
                ModelConfig { active_model: None },
            ),
        ];

        for (description, key, config) in test_cases {
            let store = MockConfigStore::new();
            test_config_lifecycle(&store, &key, config, description);
        }
    }

    #[test]
    fn test_app_config_fills_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"ollamaUrl": "http://example:11434"}"#).unwrap();

        assert_eq!(config.ollama_url, "http://example:11434");
        assert_eq!(config.health_intervals(), HealthIntervals::default());
        assert_eq!(config.catalog_source(), CatalogSource::Bundled);
    }

    #[test]
    fn test_ollama_endpoint_is_validated() {
        let endpoint = AppConfig::default().ollama_endpoint().unwrap();
        assert_eq!(endpoint.url().as_str(), "http://localhost:11434/");

        let config = AppConfig {
            ollama_url: "localhost:11434".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.ollama_endpoint(),
            Err(ConfigError::Endpoint(_))
        ));
    }

    #[test]
    fn test_catalog_source_from_path() {
        let config = AppConfig {
            catalog_path: Some(PathBuf::from("models.json")),
            ..AppConfig::default()
        };

        assert_eq!(
            config.catalog_source(),
            CatalogSource::File(PathBuf::from("models.json"))
        );
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = FileConfigStore::open(&path).unwrap();
        assert_eq!(store.get(&ConfigKey::MODEL), None);
        store
            .set(
                &ConfigKey::MODEL,
                ModelConfig {
                    active_model: Some(ModelSelector::new("gemma2", "9b")),
                },
            )
            .unwrap();

        let reopened = FileConfigStore::open(&path).unwrap();
        let config = reopened.get(&ConfigKey::MODEL).unwrap();
        assert_eq!(config.active_model, Some(ModelSelector::new("gemma2", "9b")));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["modelConfig"]["activeModel"], "gemma2:9b");

        reopened.delete(&ConfigKey::MODEL).unwrap();
        let reopened = FileConfigStore::open(&path).unwrap();
        assert_eq!(reopened.get(&ConfigKey::MODEL), None);
    }

    #[test]
    fn test_file_store_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            FileConfigStore::open(&path),
            Err(ConfigError::Serde(_))
        ));
    }

    // Helper function to check if a string is in camelCase format
    fn is_camel_case(s: &str) -> bool {
        let mut chars = s.chars();

        match chars.next() {
            Some(first) if first.is_ascii_lowercase() => {}
            _ => return false,
        }

        chars.all(|c| c.is_alphanumeric())
    }

    // Helper function to verify camelCase format dynamically
    fn verify_camel_case<T>(store: &MockConfigStore, key: &ConfigKey<T>) {
        assert!(
            is_camel_case(key.key_name()),
            "Config key '{}' should be camelCase",
            key.key_name()
        );

        let stored_json = store.data.lock().unwrap().get(key.key_name()).cloned();
        if let Some(obj) = stored_json.as_ref().and_then(|v| v.as_object()) {
            for field_key in obj.keys() {
                assert!(
                    is_camel_case(field_key),
                    "Field '{}' in {} should be camelCase",
                    field_key,
                    key.key_name()
                );
            }
        }
    }

    // Helper function to test the full lifecycle of a config
    fn test_config_lifecycle<T>(
        store: &MockConfigStore,
        key: &ConfigKey<T>,
        test_config: T,
        description: &str,
    ) where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug + Clone,
    {
        let result: Option<T> = store.get(key);
        assert!(result.is_none(), "{}: Get should return None before set", description);

        store
            .set(key, test_config.clone())
            .unwrap_or_else(|e| panic!("{}: Set should succeed: {}", description, e));

        let result: Option<T> = store.get(key);
        assert_eq!(
            result,
            Some(test_config),
            "{}: Retrieved config should match",
            description
        );

        verify_camel_case(store, key);

        store
            .delete(key)
            .unwrap_or_else(|e| panic!("{}: Delete should succeed: {}", description, e));

        let result: Option<T> = store.get(key);
        assert!(result.is_none(), "{}: Get should return None after delete", description);
    }
}
