//! Agent settings file
//!
//! ```toml
//! [home]
//! latitude = 48.137
//! longitude = 11.575
//!
//! [service]
//! lookup_host = "tls.example.org"
//!
//! [contribution]
//! update_interval = 60
//! k_privacy = 3
//! outdoor_temperature_sensors = ["sensor.garden_temperature"]
//!
//! [states]
//! snapshot = "/var/lib/trixel/states.json"
//! refresh_interval = "15s"
//! ```

use crate::config::{Coordinate, EntryData, EntryOptions};
use crate::entry::SupervisorOptions;
use crate::error::{Result, TrixelError};
use crate::storage::JsonFileStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_STORAGE_DIR: &str = "TRIXEL_STORAGE_DIR";
pub const ENV_LATITUDE: &str = "TRIXEL_LATITUDE";
pub const ENV_LONGITUDE: &str = "TRIXEL_LONGITUDE";

/// Settings of the contribution agent binary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub home: HomeSettings,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub contribution: EntryOptions,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub states: StateSettings,
    #[serde(default)]
    pub supervisor: SupervisorOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeSettings {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Host of the Trixel lookup service
    #[serde(default)]
    pub lookup_host: String,
    #[serde(default = "default_true")]
    pub tls_use_https: bool,
    #[serde(default = "default_true")]
    pub tms_use_https: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            lookup_host: String::new(),
            tls_use_https: true,
            tms_use_https: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory of the persisted client configuration
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSettings {
    /// JSON snapshot of host location and entity states
    pub snapshot: Option<PathBuf>,
    #[serde(with = "humantime_serde", default = "default_refresh_interval")]
    pub refresh_interval: Duration,
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(15)
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            snapshot: None,
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl AgentSettings {
    /// Load settings from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrixelError::config(format!("Failed to read settings file {path:?}: {e}"))
        })?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| TrixelError::config(format!("Failed to parse settings: {e}")))?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Load from `path` if given, otherwise start from defaults; then apply
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides looked up by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            self.storage.directory = Some(PathBuf::from(dir));
        }
        if let Some(latitude) = lookup(ENV_LATITUDE) {
            self.home.latitude = Some(parse_degrees(ENV_LATITUDE, &latitude)?);
        }
        if let Some(longitude) = lookup(ENV_LONGITUDE) {
            self.home.longitude = Some(parse_degrees(ENV_LONGITUDE, &longitude)?);
        }
        Ok(())
    }

    /// Check everything needed to run a client
    pub fn validate(&self) -> Result<()> {
        if self.service.lookup_host.trim().is_empty() {
            return Err(TrixelError::config("service.lookup_host must be set"));
        }
        if let Some(latitude) = self.home.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(TrixelError::config(format!(
                    "home.latitude out of range: {latitude}"
                )));
            }
        }
        if let Some(longitude) = self.home.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(TrixelError::config(format!(
                    "home.longitude out of range: {longitude}"
                )));
            }
        }
        if self.states.refresh_interval.is_zero() {
            return Err(TrixelError::config("states.refresh_interval must be positive"));
        }
        self.entry_data().lookup_service_url()?;
        self.contribution.validate()
    }

    /// Home location, if both components are set
    pub fn home_location(&self) -> Option<Coordinate> {
        match (self.home.latitude, self.home.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn entry_data(&self) -> EntryData {
        EntryData {
            tls_host: self.service.lookup_host.clone(),
            tls_use_https: self.service.tls_use_https,
            tms_use_https: self.service.tms_use_https,
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .directory
            .clone()
            .unwrap_or_else(JsonFileStore::default_dir)
    }
}

fn parse_degrees(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| TrixelError::config(format!("{key} is not a number: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [home]
        latitude = 48.137
        longitude = 11.575

        [service]
        lookup_host = "tls.example.org"
        tms_use_https = false

        [contribution]
        update_interval = 300
        outdoor_temperature_sensors = ["sensor.garden"]

        [states]
        snapshot = "states.json"
        refresh_interval = "30s"

        [supervisor]
        startup_grace = "5s"
        reload_delay = "1m"
    "#;

    #[test]
    fn test_parse_sample() {
        let settings: AgentSettings = toml::from_str(SAMPLE).unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.home_location(), Some(Coordinate::new(48.137, 11.575)));
        assert!(settings.entry_data().tls_use_https);
        assert!(!settings.entry_data().tms_use_https);
        assert_eq!(settings.contribution.update_interval, 300);
        assert_eq!(settings.contribution.k, 3);
        assert_eq!(settings.states.refresh_interval, Duration::from_secs(30));
        assert_eq!(settings.supervisor.reload_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_defaults_need_lookup_host() {
        let settings = AgentSettings::default();
        assert!(settings.home_location().is_none());
        assert_eq!(settings.supervisor, SupervisorOptions::default());
        assert!(matches!(settings.validate(), Err(TrixelError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_LATITUDE, "52.0"),
            (ENV_LONGITUDE, " 5.1 "),
            (ENV_STORAGE_DIR, "/tmp/trixel"),
        ]
        .into_iter()
        .collect();

        let mut settings = AgentSettings::default();
        settings
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.home_location(), Some(Coordinate::new(52.0, 5.1)));
        assert_eq!(settings.storage_dir(), PathBuf::from("/tmp/trixel"));

        let mut settings = AgentSettings::default();
        let result = settings.apply_overrides(|key| (key == ENV_LATITUDE).then(|| "north".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_options_rejected() {
        let mut settings: AgentSettings = toml::from_str(SAMPLE).unwrap();
        settings.contribution.update_interval = 5;
        assert!(matches!(settings.validate(), Err(TrixelError::InvalidInput(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let settings = AgentSettings::load_from_file(&path).unwrap();
        assert_eq!(settings.service.lookup_host, "tls.example.org");

        assert!(AgentSettings::load_from_file(dir.path().join("missing.toml")).is_err());
    }
}
