//! JSON file storage
//!
//! Writes `<dir>/<key>.json` through a temporary file and a rename so a crash
//! mid-write never leaves a truncated document behind.

use super::{ConfigStore, StoredDocument, STORAGE_KEY};
use crate::config::ClientConfig;
use crate::error::{Result, TrixelError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration store backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store the document under `dir` using the default storage key
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_key(dir, STORAGE_KEY)
    }

    pub fn with_key<P: AsRef<Path>>(dir: P, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// Default storage directory of the agent
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trixel-contribution-client")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<Option<ClientConfig>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored client configuration at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(TrixelError::Io(e)),
        };

        let document: StoredDocument = serde_json::from_str(&contents).map_err(|e| {
            TrixelError::storage(format!(
                "Failed to parse stored configuration {:?}: {e}",
                self.path
            ))
        })?;
        debug!("Loaded client configuration from {:?}", self.path);
        document.into_config().map(Some)
    }

    async fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let serialized = serde_json::to_string_pretty(&StoredDocument::new(config.clone()))?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, serialized).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(
            sensors = config.sensors.len(),
            "Saved client configuration to {:?}", self.path
        );
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Removed stored client configuration {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TrixelError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Coordinate, Sensor};
    use crate::measurement::MeasurementType;

    fn config() -> ClientConfig {
        let mut config = ClientConfig::new(Coordinate::new(48.1, 11.5), "tls.example.org", 3, 24);
        config
            .sensors
            .push(Sensor::for_entity(MeasurementType::AmbientTemperature, "sensor.a"));
        config
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));

        store.save(&config()).await.unwrap();
        assert!(store.path().exists());
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().await.unwrap(), Some(config()));

        store.remove().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Removing twice is fine
        store.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupted_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        tokio::fs::write(store.path(), "{ not json").await.unwrap();
        assert!(matches!(store.load().await, Err(TrixelError::Storage(_))));
    }
}
