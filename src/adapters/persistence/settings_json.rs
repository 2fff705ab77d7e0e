//! Implements SettingsPort using a JSON file.
//!
//! Keeps the endpoint URL so it survives restarts.

use crate::domain::{DomainError, EndpointConfig};
use crate::ports::SettingsPort;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsData {
    #[serde(default)]
    endpoint: Option<EndpointConfig>,
}

/// JSON file-based settings storage.
pub struct SettingsJson {
    path: std::path::PathBuf,
    cache: tokio::sync::RwLock<SettingsData>,
}

impl SettingsJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: tokio::sync::RwLock::new(SettingsData::default()),
        }
    }

    /// Load settings from disk. A missing file is an empty store; a corrupt one is
    /// logged and ignored.
    pub async fn load(&self) -> Result<(), DomainError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "settings file unreadable; starting empty");
                SettingsData::default()
            }),
            Err(_) => SettingsData::default(),
        };
        *self.cache.write().await = data;
        Ok(())
    }

    /// Write to a temp file, fsync, then rename over the target.
    async fn save(&self) -> Result<(), DomainError> {
        let data = self.cache.read().await;
        let json =
            serde_json::to_string_pretty(&*data).map_err(|e| DomainError::Settings(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Settings(format!("create settings dir: {}", e)))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Settings(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Settings(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Settings(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Settings(format!("atomic rename failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsPort for SettingsJson {
    async fn load_endpoint(&self) -> Result<Option<EndpointConfig>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache.endpoint.clone())
    }

    async fn save_endpoint(&self, endpoint: &EndpointConfig) -> Result<(), DomainError> {
        {
            let mut cache = self.cache.write().await;
            cache.endpoint = Some(endpoint.clone());
        }
        self.save().await
    }
}
