//! Setup and reconfiguration helpers
//!
//! The setup form collects immutable entry data and user-editable options in
//! one flat mapping; these helpers split, validate and test it against the
//! network before an entry is created.

use crate::config::{EntryData, EntryOptions};
use crate::entry::EntryContext;
use crate::error::{Result, TrixelError};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info};

/// Keys of the flat form that belong to [`EntryData`]
pub const DATA_KEYS: [&str; 3] = [
    "trixel_lookup_service_host",
    "tls_use_https",
    "tms_use_https",
];

pub const NOT_ENOUGH_SENSORS: &str = "not_enough_sensors";

/// Flat key/value mapping submitted by a setup form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInput(Map<String, Value>);

impl UserInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merge another form step into this one; later values win
    pub fn update(&mut self, other: UserInput) {
        self.0.extend(other.0);
    }

    /// Split into entry data and entry options
    pub fn split_data_and_options(&self) -> Result<(EntryData, EntryOptions)> {
        let (data, options): (Map<String, Value>, Map<String, Value>) = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .partition(|(k, _)| DATA_KEYS.contains(&k.as_str()));

        let data: EntryData = serde_json::from_value(Value::Object(data))
            .map_err(|e| TrixelError::invalid_input(format!("Invalid entry data: {e}")))?;
        let options: EntryOptions = serde_json::from_value(Value::Object(options))
            .map_err(|e| TrixelError::invalid_input(format!("Invalid entry options: {e}")))?;
        Ok((data, options))
    }

    /// Apply a reconfiguration form on top of existing options
    pub fn merge_into_options(&self, existing: &EntryOptions) -> Result<EntryOptions> {
        let mut merged = match serde_json::to_value(existing)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(
            self.0
                .iter()
                .filter(|(k, _)| !DATA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        serde_json::from_value(Value::Object(merged))
            .map_err(|e| TrixelError::invalid_input(format!("Invalid entry options: {e}")))
    }
}

impl From<Map<String, Value>> for UserInput {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Form error reported back to the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key}: {detail}")]
pub struct FlowError {
    /// Translation key shown by the form
    pub key: &'static str,
    pub detail: String,
}

impl From<TrixelError> for FlowError {
    fn from(err: TrixelError) -> Self {
        Self {
            key: err.setup_error_key(),
            detail: err.to_string(),
        }
    }
}

/// At least one sensor of any type has to be selected
pub fn validate_sensor_count(options: &EntryOptions) -> Option<&'static str> {
    if options.sensor_count() == 0 {
        Some(NOT_ENOUGH_SENSORS)
    } else {
        None
    }
}

/// Create a client for the proposed entry, register it once and stop it
pub async fn validate_connection(
    ctx: &EntryContext,
    data: &EntryData,
    options: &EntryOptions,
) -> Result<()> {
    let client = ctx.create_client(Some(data), Some(options)).await?;
    let result = client.start().await;
    client.kill();
    result
}

/// Validate a complete setup form and prove it can register
///
/// Any configuration left behind by an aborted earlier setup is removed first.
pub async fn configure_new_entry(
    ctx: &EntryContext,
    input: &UserInput,
) -> std::result::Result<(EntryData, EntryOptions), FlowError> {
    ctx.store.remove().await?;

    let (data, options) = input.split_data_and_options()?;
    if let Some(key) = validate_sensor_count(&options) {
        return Err(FlowError {
            key,
            detail: "No sensor selected".to_string(),
        });
    }
    options.validate()?;

    if let Err(e) = validate_connection(ctx, &data, &options).await {
        let flow_error = FlowError::from(e);
        if flow_error.key == "unknown" {
            error!("Unexpected error during contribution client setup: {}", flow_error.detail);
        }
        return Err(flow_error);
    }

    info!(
        host = %data.tls_host,
        sensors = options.sensor_count(),
        "Validated new configuration entry"
    );
    Ok((data, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, Coordinate};
    use crate::host::InMemoryHost;
    use crate::mock::MockNetwork;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn full_input() -> UserInput {
        UserInput::new()
            .with("trixel_lookup_service_host", "tls.example.org")
            .with("tls_use_https", false)
            .with("update_interval", 120)
            .with("k_privacy", 4)
            .with("outdoor_temperature_sensors", json!(["sensor.t"]))
            .with("outdoor_relative_humidity_sensors", json!([]))
    }

    fn context(network: Arc<MockNetwork>, store: Arc<MemoryStore>) -> EntryContext {
        EntryContext::new(
            Arc::new(InMemoryHost::new(Some(Coordinate::new(48.137, 11.575)))),
            store,
            network,
        )
    }

    #[test]
    fn test_split_data_and_options() {
        let (data, options) = full_input().split_data_and_options().unwrap();
        assert_eq!(data.tls_host, "tls.example.org");
        assert!(!data.tls_use_https);
        assert!(data.tms_use_https);
        assert_eq!(options.update_interval, 120);
        assert_eq!(options.k, 4);
        assert_eq!(options.max_depth, 24);
        assert_eq!(options.temperature_sensors, vec!["sensor.t".to_string()]);
    }

    #[test]
    fn test_split_requires_host() {
        let input = UserInput::new().with("update_interval", 60);
        assert!(matches!(
            input.split_data_and_options(),
            Err(TrixelError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sensor_count_validation() {
        assert_eq!(
            validate_sensor_count(&EntryOptions::default()),
            Some(NOT_ENOUGH_SENSORS)
        );
        let options = EntryOptions {
            humidity_sensors: vec!["sensor.h".to_string()],
            ..EntryOptions::default()
        };
        assert_eq!(validate_sensor_count(&options), None);
    }

    #[test]
    fn test_merge_into_options_keeps_unchanged_fields() {
        let existing = EntryOptions {
            temperature_sensors: vec!["sensor.t".to_string()],
            ..EntryOptions::default()
        };
        let merged = UserInput::new()
            .with("maximum_trixel_depth", 10)
            .with("trixel_lookup_service_host", "ignored")
            .merge_into_options(&existing)
            .unwrap();
        assert_eq!(merged.max_depth, 10);
        assert_eq!(merged.temperature_sensors, existing.temperature_sensors);
    }

    #[tokio::test]
    async fn test_configure_removes_stale_config() {
        let stale = ClientConfig::new(Coordinate::new(1.0, 1.0), "old", 3, 24);
        let store = Arc::new(MemoryStore::with_config(&stale).unwrap());
        let network = Arc::new(MockNetwork::new());
        let ctx = context(network.clone(), store.clone());

        let (data, _) = configure_new_entry(&ctx, &full_input()).await.unwrap();
        assert_eq!(data.tls_host, "tls.example.org");

        let stored = store.snapshot().await.unwrap().unwrap();
        assert_eq!(stored.tls_host, "tls.example.org");
        assert_eq!(network.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_configure_maps_error_keys() {
        let network = Arc::new(MockNetwork::new());
        network.fail_register_with(TrixelError::authentication("bad token"));
        let ctx = context(network.clone(), Arc::new(MemoryStore::new()));
        let err = configure_new_entry(&ctx, &full_input()).await.unwrap_err();
        assert_eq!(err.key, "invalid_auth");

        network.fail_register_with(TrixelError::network("refused"));
        let err = configure_new_entry(&ctx, &full_input()).await.unwrap_err();
        assert_eq!(err.key, "cannot_connect");

        let homeless = EntryContext::new(
            Arc::new(InMemoryHost::new(None)),
            Arc::new(MemoryStore::new()),
            network,
        );
        let err = configure_new_entry(&homeless, &full_input()).await.unwrap_err();
        assert_eq!(err.key, "no_home");
    }

    #[tokio::test]
    async fn test_configure_rejects_empty_selection() {
        let ctx = context(Arc::new(MockNetwork::new()), Arc::new(MemoryStore::new()));
        let input = UserInput::new()
            .with("trixel_lookup_service_host", "tls")
            .with("outdoor_temperature_sensors", json!([]));
        let err = configure_new_entry(&ctx, &input).await.unwrap_err();
        assert_eq!(err.key, NOT_ENOUGH_SENSORS);
    }
}
