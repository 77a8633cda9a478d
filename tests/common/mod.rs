//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use trixel_contribution_client::{
    ClientConfig, Coordinate, EntityState, EntryData, EntryOptions, InMemoryHost,
    MeasurementBatch, MeasurementNetwork, OfflineNetwork, Result, TrixelError,
};

pub const HOME: Coordinate = Coordinate {
    latitude: 48.137,
    longitude: 11.575,
};

pub fn host() -> Arc<InMemoryHost> {
    Arc::new(InMemoryHost::new(Some(HOME)))
}

pub fn reading(value: &str, unit: Option<&str>, device_class: &str, secs: i64) -> EntityState {
    EntityState::new(
        value,
        unit,
        Some(device_class),
        Utc.timestamp_opt(secs, 0).unwrap(),
    )
}

pub fn celsius(value: &str, secs: i64) -> EntityState {
    reading(value, Some("°C"), "temperature", secs)
}

pub fn humidity(value: &str, secs: i64) -> EntityState {
    reading(value, Some("%"), "humidity", secs)
}

pub fn data() -> EntryData {
    EntryData::new("tls.example.org")
}

pub fn options(temperature: &[&str], humidity: &[&str]) -> EntryOptions {
    EntryOptions {
        temperature_sensors: temperature.iter().map(|s| s.to_string()).collect(),
        humidity_sensors: humidity.iter().map(|s| s.to_string()).collect(),
        ..EntryOptions::default()
    }
}

/// Network that assigns ids like the offline network and records batches
#[derive(Debug, Default)]
pub struct RecordingNetwork {
    inner: OfflineNetwork,
    published: Mutex<Vec<MeasurementBatch>>,
    deletions: Mutex<usize>,
}

impl RecordingNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<MeasurementBatch> {
        self.published.lock().unwrap().clone()
    }

    pub fn deletions(&self) -> usize {
        *self.deletions.lock().unwrap()
    }
}

#[async_trait]
impl MeasurementNetwork for RecordingNetwork {
    async fn register(&self, config: &mut ClientConfig) -> Result<()> {
        self.inner.register(config).await
    }

    async fn publish(&self, _config: &ClientConfig, batch: &MeasurementBatch) -> Result<()> {
        self.published.lock().unwrap().push(batch.clone());
        Ok(())
    }

    async fn delete(&self, _config: &ClientConfig) -> Result<()> {
        *self.deletions.lock().unwrap() += 1;
        Ok(())
    }
}

/// Network whose every call fails with a network error
#[derive(Debug, Default)]
pub struct UnreachableNetwork;

#[async_trait]
impl MeasurementNetwork for UnreachableNetwork {
    async fn register(&self, _config: &mut ClientConfig) -> Result<()> {
        Err(TrixelError::network("lookup service unreachable"))
    }

    async fn publish(&self, _config: &ClientConfig, _batch: &MeasurementBatch) -> Result<()> {
        Err(TrixelError::network("measurement service unreachable"))
    }

    async fn delete(&self, _config: &ClientConfig) -> Result<()> {
        Err(TrixelError::network("measurement service unreachable"))
    }
}
