//! Client configuration and entry options
//!
//! [`ClientConfig`] is the durable document that survives restarts. The
//! [`EntryData`] / [`EntryOptions`] pair is what the user supplied during setup
//! or reconfiguration; options are reconciled onto the stored config every time
//! a client is created.

pub mod flow;
pub mod settings;

use crate::error::{Result, TrixelError};
use crate::measurement::MeasurementType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Latitude of the onboarding placeholder home location
pub const DEFAULT_HOME_LATITUDE: f64 = 52.3731339;
/// Longitude of the onboarding placeholder home location
pub const DEFAULT_HOME_LONGITUDE: f64 = 4.8903147;

pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 60;
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 15;
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 900;
pub const DEFAULT_K_REQUIREMENT: u32 = 3;
pub const MIN_K_REQUIREMENT: u32 = 2;
pub const DEFAULT_MAX_TRIXEL_DEPTH: u8 = 24;
pub const MIN_TRIXEL_DEPTH: u8 = 1;
pub const MAX_TRIXEL_DEPTH: u8 = 24;

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// False for an unset (0, 0) location or the onboarding placeholder
    pub fn is_configured(&self) -> bool {
        let unset = self.latitude == 0.0 && self.longitude == 0.0;
        let placeholder =
            self.latitude == DEFAULT_HOME_LATITUDE && self.longitude == DEFAULT_HOME_LONGITUDE;
        !unset && !placeholder
    }
}

/// Station identity issued by the network on registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementStationConfig {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl MeasurementStationConfig {
    pub fn is_registered(&self) -> bool {
        self.uuid.is_some() && self.token.is_some()
    }
}

/// A single contributing data source
///
/// `entity_id` links the sensor to a host entity and is never sent to the
/// network. `sensor_id` stays `None` until the network registered the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub measurement_type: MeasurementType,
    #[serde(default)]
    pub sensor_id: Option<u32>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Sensor {
    /// New, not yet registered sensor linked to a host entity
    pub fn for_entity(measurement_type: MeasurementType, entity_id: impl Into<String>) -> Self {
        Self {
            measurement_type,
            sensor_id: None,
            entity_id: Some(entity_id.into()),
            sensor_name: None,
            accuracy: None,
        }
    }

    pub fn matches(&self, measurement_type: MeasurementType, entity_id: &str) -> bool {
        self.measurement_type == measurement_type && self.entity_id.as_deref() == Some(entity_id)
    }
}

/// Durable client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub location: Coordinate,
    /// Lookup service address, fixed at creation
    pub tls_host: String,
    /// Minimum anonymity-set size
    pub k: u32,
    /// Maximum trixel depth
    pub max_depth: u8,
    #[serde(default)]
    pub ms_config: MeasurementStationConfig,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

impl ClientConfig {
    pub fn new(location: Coordinate, tls_host: impl Into<String>, k: u32, max_depth: u8) -> Self {
        Self {
            location,
            tls_host: tls_host.into(),
            k,
            max_depth,
            ms_config: MeasurementStationConfig::default(),
            sensors: Vec::new(),
        }
    }

    /// Find the sensor contributing `entity_id` for `measurement_type`
    pub fn sensor(&self, measurement_type: MeasurementType, entity_id: &str) -> Option<&Sensor> {
        self.sensors
            .iter()
            .find(|s| s.matches(measurement_type, entity_id))
    }

    pub fn sensors_of_type(&self, measurement_type: MeasurementType) -> impl Iterator<Item = &Sensor> {
        self.sensors
            .iter()
            .filter(move |s| s.measurement_type == measurement_type)
    }
}

/// Immutable part of a configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    #[serde(rename = "trixel_lookup_service_host")]
    pub tls_host: String,
    #[serde(default = "default_true")]
    pub tls_use_https: bool,
    #[serde(default = "default_true")]
    pub tms_use_https: bool,
}

fn default_true() -> bool {
    true
}

impl EntryData {
    pub fn new(tls_host: impl Into<String>) -> Self {
        Self {
            tls_host: tls_host.into(),
            tls_use_https: true,
            tms_use_https: true,
        }
    }

    /// Base URL of the lookup service
    pub fn lookup_service_url(&self) -> Result<Url> {
        let scheme = if self.tls_use_https { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{}", self.tls_host)).map_err(|e| {
            TrixelError::config(format!("Invalid lookup service host '{}': {e}", self.tls_host))
        })
    }
}

/// User-editable part of a configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    /// Polling interval in seconds
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    #[serde(rename = "k_privacy", default = "default_k")]
    pub k: u32,
    #[serde(rename = "maximum_trixel_depth", default = "default_max_depth")]
    pub max_depth: u8,
    #[serde(rename = "outdoor_temperature_sensors", default)]
    pub temperature_sensors: Vec<String>,
    #[serde(rename = "outdoor_relative_humidity_sensors", default)]
    pub humidity_sensors: Vec<String>,
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_SECS
}

fn default_k() -> u32 {
    DEFAULT_K_REQUIREMENT
}

fn default_max_depth() -> u8 {
    DEFAULT_MAX_TRIXEL_DEPTH
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL_SECS,
            k: DEFAULT_K_REQUIREMENT,
            max_depth: DEFAULT_MAX_TRIXEL_DEPTH,
            temperature_sensors: Vec::new(),
            humidity_sensors: Vec::new(),
        }
    }
}

impl EntryOptions {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    /// Selected entity ids for one measurement type
    pub fn sensors_for(&self, measurement_type: MeasurementType) -> &[String] {
        match measurement_type {
            MeasurementType::AmbientTemperature => &self.temperature_sensors,
            MeasurementType::RelativeHumidity => &self.humidity_sensors,
        }
    }

    /// Desired sensor set covering every measurement type
    pub fn desired_sensors(&self) -> BTreeMap<MeasurementType, Vec<String>> {
        MeasurementType::ALL
            .iter()
            .map(|t| (*t, self.sensors_for(*t).to_vec()))
            .collect()
    }

    pub fn sensor_count(&self) -> usize {
        self.temperature_sensors.len() + self.humidity_sensors.len()
    }

    /// Check the numeric option ranges
    pub fn validate(&self) -> Result<()> {
        if !(MIN_UPDATE_INTERVAL_SECS..=MAX_UPDATE_INTERVAL_SECS).contains(&self.update_interval) {
            return Err(TrixelError::invalid_input(format!(
                "update_interval must be between {MIN_UPDATE_INTERVAL_SECS} and {MAX_UPDATE_INTERVAL_SECS} seconds, got {}",
                self.update_interval
            )));
        }
        if self.k < MIN_K_REQUIREMENT {
            return Err(TrixelError::invalid_input(format!(
                "k requirement must be at least {MIN_K_REQUIREMENT}, got {}",
                self.k
            )));
        }
        if !(MIN_TRIXEL_DEPTH..=MAX_TRIXEL_DEPTH).contains(&self.max_depth) {
            return Err(TrixelError::invalid_input(format!(
                "maximum trixel depth must be between {MIN_TRIXEL_DEPTH} and {MAX_TRIXEL_DEPTH}, got {}",
                self.max_depth
            )));
        }
        Ok(())
    }
}
