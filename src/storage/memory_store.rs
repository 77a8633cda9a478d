//! In-memory configuration store
//!
//! Keeps the serialized document in memory so the same encode/decode path as
//! the file store is exercised. Data is lost when the store is dropped.

use super::{ConfigStore, StoredDocument};
use crate::config::ClientConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Configuration store kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RwLock<Option<String>>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `config`
    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        let mut store = Self::new();
        let serialized = serde_json::to_string(&StoredDocument::new(config.clone()))?;
        *store.document.get_mut() = Some(serialized);
        Ok(store)
    }

    /// Currently stored configuration without counting as a load
    pub async fn snapshot(&self) -> Result<Option<ClientConfig>> {
        match self.document.read().await.as_deref() {
            Some(raw) => serde_json::from_str::<StoredDocument>(raw)?
                .into_config()
                .map(Some),
            None => Ok(None),
        }
    }

    /// Number of `load` calls served
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `save` calls served
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<Option<ClientConfig>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.snapshot().await
    }

    async fn save(&self, config: &ClientConfig) -> Result<()> {
        let serialized = serde_json::to_string(&StoredDocument::new(config.clone()))?;
        *self.document.write().await = Some(serialized);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.document.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Coordinate;

    #[tokio::test]
    async fn test_memory_store_counts_operations() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let config = ClientConfig::new(Coordinate::new(1.0, 2.0), "tls", 2, 10);
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(config));
        assert_eq!(store.load_count(), 2);
        assert_eq!(store.save_count(), 1);

        store.remove().await.unwrap();
        assert!(store.snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_with_config_is_preloaded() {
        let config = ClientConfig::new(Coordinate::new(1.0, 2.0), "tls", 3, 24);
        let store = MemoryStore::with_config(&config).unwrap();

        assert_eq!(store.snapshot().await.unwrap(), Some(config.clone()));
        assert_eq!(store.save_count(), 0);
        assert_eq!(store.load().await.unwrap(), Some(config));
        assert_eq!(store.load_count(), 1);
    }
}
