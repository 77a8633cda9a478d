//! Host context injected into the client
//!
//! The client never looks up ambient host state on its own. Location and entity
//! states are read through [`HostContext`], which keeps every operation
//! testable without a live home automation host.

use crate::config::Coordinate;
use crate::error::{Result, TrixelError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Current state of a host entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Raw state value, e.g. `"21.4"` or `"unavailable"`
    pub state: String,
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    #[serde(default)]
    pub device_class: Option<String>,
    /// Moment the host last received a reading from the entity
    pub last_reported: DateTime<Utc>,
}

impl EntityState {
    pub fn new(
        state: impl Into<String>,
        unit_of_measurement: Option<&str>,
        device_class: Option<&str>,
        last_reported: DateTime<Utc>,
    ) -> Self {
        Self {
            state: state.into(),
            unit_of_measurement: unit_of_measurement.map(str::to_string),
            device_class: device_class.map(str::to_string),
            last_reported,
        }
    }

    /// `last_reported` rounded to whole seconds since the epoch, ties to even
    pub fn reported_timestamp(&self) -> i64 {
        (self.last_reported.timestamp_millis() as f64 / 1000.0).round_ties_even() as i64
    }
}

/// Read-only view of the host
pub trait HostContext: Send + Sync {
    /// Home location, `None` if the host has none configured
    fn location(&self) -> Option<Coordinate>;

    /// Current state of `entity_id`, `None` if it cannot be read
    fn state(&self, entity_id: &str) -> Option<EntityState>;
}

/// Snapshot file read by [`InMemoryHost::load_snapshot`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSnapshot {
    #[serde(default)]
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub states: HashMap<String, EntityState>,
}

/// Host context holding location and states in memory
#[derive(Debug, Default)]
pub struct InMemoryHost {
    location: RwLock<Option<Coordinate>>,
    states: RwLock<HashMap<String, EntityState>>,
}

impl InMemoryHost {
    pub fn new(location: Option<Coordinate>) -> Self {
        Self {
            location: RwLock::new(location),
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_state(self, entity_id: impl Into<String>, state: EntityState) -> Self {
        self.set_state(entity_id, state);
        self
    }

    pub fn set_location(&self, location: Option<Coordinate>) {
        *write(&self.location) = location;
    }

    pub fn set_state(&self, entity_id: impl Into<String>, state: EntityState) {
        write(&self.states).insert(entity_id.into(), state);
    }

    pub fn remove_state(&self, entity_id: &str) -> Option<EntityState> {
        write(&self.states).remove(entity_id)
    }

    pub fn replace_states(&self, states: HashMap<String, EntityState>) {
        *write(&self.states) = states;
    }

    /// Replace states (and the location, if present) from a JSON snapshot file
    pub async fn load_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let snapshot: HostSnapshot = serde_json::from_str(&contents).map_err(|e| {
            TrixelError::config(format!("Failed to parse state snapshot {path:?}: {e}"))
        })?;

        if let Some(location) = snapshot.location {
            self.set_location(Some(location));
        }
        let count = snapshot.states.len();
        self.replace_states(snapshot.states);
        debug!("Loaded {} entity states from {:?}", count, path);
        Ok(count)
    }
}

impl HostContext for InMemoryHost {
    fn location(&self) -> Option<Coordinate> {
        *read(&self.location)
    }

    fn state(&self, entity_id: &str) -> Option<EntityState> {
        read(&self.states).get(entity_id).cloned()
    }
}

// A writer that panicked mid-update leaves plain data behind; keep serving it.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("Recovering host state after a panicked writer");
        poisoned.into_inner()
    })
}
