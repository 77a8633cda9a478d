//! Last-seen timestamp cache used to suppress unchanged readings
//!
//! Losing the cache (e.g. on restart) is harmless: at most one duplicate
//! publish per sensor follows.

use std::collections::HashMap;
use tracing::trace;

/// Mapping of network sensor id to the last published timestamp (seconds)
#[derive(Debug, Clone, Default)]
pub struct LastSeenCache {
    timestamps: HashMap<u32, i64>,
}

impl LastSeenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reading at `timestamp` should be published; records it if so
    ///
    /// Anything different from the last recorded timestamp is emitted. A
    /// sensor never seen before compares against 0.
    pub fn should_emit(&mut self, sensor_id: u32, timestamp: i64) -> bool {
        let last = self.timestamps.get(&sensor_id).copied().unwrap_or(0);
        if timestamp == last {
            trace!(sensor_id, timestamp, "Suppressing unchanged measurement");
            return false;
        }
        self.timestamps.insert(sensor_id, timestamp);
        true
    }

    pub fn last_seen(&self, sensor_id: u32) -> Option<i64> {
        self.timestamps.get(&sensor_id).copied()
    }

    /// Drop entries for sensors that are no longer configured
    pub fn retain_sensors(&mut self, sensor_ids: &[u32]) {
        self.timestamps.retain(|id, _| sensor_ids.contains(id));
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}
