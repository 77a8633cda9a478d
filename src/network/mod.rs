//! Contract with the remote Trixel network
//!
//! Registration, authentication and the wire protocol live behind
//! [`MeasurementNetwork`]. The client only hands over its configuration and one
//! batch of updates per polling tick.

pub mod offline;

use crate::config::ClientConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use offline::OfflineNetwork;

/// One sensor's reading within a polling tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementUpdate {
    /// Seconds since the epoch at which the host last received the reading
    pub timestamp: i64,
    /// Canonical value; `None` when the sensor currently has no reading
    pub value: Option<f64>,
}

/// Updates of one polling tick keyed by network sensor id
pub type MeasurementBatch = BTreeMap<u32, MeasurementUpdate>;

/// Remote network operations used by the contribution client
#[async_trait]
pub trait MeasurementNetwork: Send + Sync {
    /// Register the station and synchronise its sensor set
    ///
    /// Implementations assign `sensor_id`s to new sensors and fill in the
    /// station identity in `config.ms_config`.
    async fn register(&self, config: &mut ClientConfig) -> Result<()>;

    /// Publish one batch of measurement updates
    async fn publish(&self, config: &ClientConfig, batch: &MeasurementBatch) -> Result<()>;

    /// Remove the station from the network
    async fn delete(&self, config: &ClientConfig) -> Result<()>;
}
