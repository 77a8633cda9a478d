//! Offline network
//!
//! Stands in for the remote network when no transport is wired up: it issues
//! a local station identity and sensor ids, and logs what would have been
//! published.

use super::{MeasurementBatch, MeasurementNetwork};
use crate::config::ClientConfig;
use crate::error::{Result, TrixelError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct OfflineNetwork {
    published: AtomicUsize,
}

impl OfflineNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches published so far
    pub fn published_batches(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeasurementNetwork for OfflineNetwork {
    async fn register(&self, config: &mut ClientConfig) -> Result<()> {
        if !config.ms_config.is_registered() {
            config.ms_config.uuid = Some(Uuid::new_v4().to_string());
            config.ms_config.token = Some(Uuid::new_v4().simple().to_string());
            info!(
                station = config.ms_config.uuid.as_deref().unwrap_or_default(),
                "Registered offline measurement station"
            );
        }

        let mut next_id = config
            .sensors
            .iter()
            .filter_map(|s| s.sensor_id)
            .max()
            .unwrap_or(0);
        for sensor in config.sensors.iter_mut().filter(|s| s.sensor_id.is_none()) {
            next_id = next_id
                .checked_add(1)
                .ok_or_else(|| TrixelError::registration("Sensor id space exhausted"))?;
            sensor.sensor_id = Some(next_id);
            debug!(
                sensor_id = next_id,
                entity_id = sensor.entity_id.as_deref().unwrap_or_default(),
                measurement_type = %sensor.measurement_type,
                "Registered sensor"
            );
        }
        Ok(())
    }

    async fn publish(&self, config: &ClientConfig, batch: &MeasurementBatch) -> Result<()> {
        self.published.fetch_add(1, Ordering::SeqCst);
        for (sensor_id, update) in batch {
            info!(
                station = config.ms_config.uuid.as_deref().unwrap_or_default(),
                sensor_id,
                timestamp = update.timestamp,
                value = ?update.value,
                "Measurement update"
            );
        }
        Ok(())
    }

    async fn delete(&self, config: &ClientConfig) -> Result<()> {
        info!(
            station = config.ms_config.uuid.as_deref().unwrap_or_default(),
            "Removed offline measurement station"
        );
        Ok(())
    }
}
