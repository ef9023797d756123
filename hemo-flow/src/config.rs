use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::ConfigError;

pub const OCR_ENDPOINT_KEY: &str = "hemologic_ocr_endpoint";
pub const AGENT_ENDPOINT_KEY: &str = "hemologic_agent_endpoint";
pub const SENDTO_ENDPOINT_KEY: &str = "hemologic_sendto_endpoint";
pub const API_KEY_KEY: &str = "hemologic_api_key";

pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.hemologic.com/v1/ocr";
pub const DEFAULT_AGENT_ENDPOINT: &str = "https://api.hemologic.com/v1/agent";
pub const DEFAULT_SENDTO_ENDPOINT: &str = "https://api.hemologic.com/v1/send-to";

/// Key-value persistence for endpoint URLs and the API key.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError>;
    async fn set(&self, key: &str, value: String) -> Result<(), ConfigError>;
    async fn remove(&self, key: &str) -> Result<(), ConfigError>;
}

/// In-memory implementation of ConfigStore
pub struct InMemoryConfigStore {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ConfigError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ConfigError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// ConfigStore backed by a single JSON object on disk. Every write rewrites
/// the whole file.
pub struct FileConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ConfigError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), ConfigError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

/// The endpoints the core actually consumes, read from the store as opaque
/// strings. No defaults are applied here: an unsaved endpoint is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointConfig {
    pub ocr: Option<String>,
    pub agent: Option<String>,
}

impl EndpointConfig {
    pub async fn read(store: &dyn ConfigStore) -> Result<Self, ConfigError> {
        Ok(Self {
            ocr: present(store.get(OCR_ENDPOINT_KEY).await?),
            agent: present(store.get(AGENT_ENDPOINT_KEY).await?),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Everything the admin form edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub ocr_endpoint: String,
    pub agent_endpoint: String,
    pub sendto_endpoint: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            ocr_endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            agent_endpoint: DEFAULT_AGENT_ENDPOINT.to_string(),
            sendto_endpoint: DEFAULT_SENDTO_ENDPOINT.to_string(),
            api_key: String::new(),
        }
    }
}

impl EndpointSettings {
    /// Stored values where present, admin defaults otherwise.
    pub async fn load(store: &dyn ConfigStore) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            ocr_endpoint: present(store.get(OCR_ENDPOINT_KEY).await?)
                .unwrap_or(defaults.ocr_endpoint),
            agent_endpoint: present(store.get(AGENT_ENDPOINT_KEY).await?)
                .unwrap_or(defaults.agent_endpoint),
            sendto_endpoint: present(store.get(SENDTO_ENDPOINT_KEY).await?)
                .unwrap_or(defaults.sendto_endpoint),
            api_key: store.get(API_KEY_KEY).await?.unwrap_or_default(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("ocr_endpoint", &self.ocr_endpoint),
            ("agent_endpoint", &self.agent_endpoint),
            ("sendto_endpoint", &self.sendto_endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(field));
            }
        }
        Ok(())
    }

    pub async fn save(&self, store: &dyn ConfigStore) -> Result<(), ConfigError> {
        self.validate()?;
        store.set(OCR_ENDPOINT_KEY, self.ocr_endpoint.trim().to_string()).await?;
        store.set(AGENT_ENDPOINT_KEY, self.agent_endpoint.trim().to_string()).await?;
        store.set(SENDTO_ENDPOINT_KEY, self.sendto_endpoint.trim().to_string()).await?;
        store.set(API_KEY_KEY, self.api_key.clone()).await?;
        info!("Endpoint configuration saved");
        Ok(())
    }

    /// Forget everything; the form falls back to defaults.
    pub async fn reset(store: &dyn ConfigStore) -> Result<(), ConfigError> {
        for key in [OCR_ENDPOINT_KEY, AGENT_ENDPOINT_KEY, SENDTO_ENDPOINT_KEY, API_KEY_KEY] {
            store.remove(key).await?;
        }
        info!("Endpoint configuration reset to defaults");
        Ok(())
    }

    pub fn masked_api_key(&self) -> &'static str {
        if self.api_key.is_empty() {
            "(Empty)"
        } else {
            "••••••••"
        }
    }
}
