//! Persistent storage for the client configuration
//!
//! The configuration is stored as one versioned document under a fixed key.
//! A missing document is a normal condition (`Ok(None)`), distinct from an
//! I/O or decoding failure.
//!
//! Available implementations:
//! - JSON file storage (default for the agent)
//! - In-memory storage (tests and embedding)

pub mod file_store;
pub mod memory_store;

use crate::config::ClientConfig;
use crate::error::{Result, TrixelError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;

/// Storage key of the client configuration document
pub const STORAGE_KEY: &str = "trixel_contribution_client_config";
/// Current schema version of the stored document
pub const STORAGE_VERSION: u32 = 1;

/// Load/save contract for the client configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored configuration, `None` if nothing was stored yet
    async fn load(&self) -> Result<Option<ClientConfig>>;

    /// Persist the configuration, replacing any previous document
    async fn save(&self, config: &ClientConfig) -> Result<()>;

    /// Delete the stored configuration; deleting nothing is not an error
    async fn remove(&self) -> Result<()>;
}

/// Envelope written to storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub version: u32,
    pub key: String,
    pub data: ClientConfig,
}

impl StoredDocument {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            version: STORAGE_VERSION,
            key: STORAGE_KEY.to_string(),
            data: config,
        }
    }

    /// Unwrap the configuration, refusing documents written by a newer schema
    pub fn into_config(self) -> Result<ClientConfig> {
        if self.version > STORAGE_VERSION {
            return Err(TrixelError::storage(format!(
                "Stored configuration has schema version {}, this client supports up to {}",
                self.version, STORAGE_VERSION
            )));
        }
        if self.key != STORAGE_KEY {
            return Err(TrixelError::storage(format!(
                "Stored document has unexpected key '{}'",
                self.key
            )));
        }
        Ok(self.data)
    }
}
