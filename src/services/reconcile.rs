//! Sensor registry diff engine
//!
//! Aligns the persisted sensor list with the sensor selection the user made.
//! Only the measurement types present in the desired mapping are reconciled;
//! sensors of any other type are neither added nor removed.

use crate::config::Sensor;
use crate::measurement::MeasurementType;
use std::collections::{BTreeMap, HashSet};

/// Desired entity ids grouped by measurement type
///
/// `BTreeMap` iterates in `MeasurementType` declaration order, which keeps the
/// resulting diff reproducible across runs.
pub type DesiredSensors = BTreeMap<MeasurementType, Vec<String>>;

/// Additions and removals needed to reach the desired sensor set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorDiff {
    pub to_add: Vec<(MeasurementType, String)>,
    pub to_remove: Vec<Sensor>,
}

impl SensorDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Apply the diff: drop removed sensors, append new unregistered ones
    pub fn apply(self, sensors: &mut Vec<Sensor>) {
        let removed: HashSet<(MeasurementType, Option<&str>)> = self
            .to_remove
            .iter()
            .map(|s| (s.measurement_type, s.entity_id.as_deref()))
            .collect();
        sensors.retain(|s| !removed.contains(&(s.measurement_type, s.entity_id.as_deref())));

        sensors.extend(
            self.to_add
                .into_iter()
                .map(|(measurement_type, entity_id)| Sensor::for_entity(measurement_type, entity_id)),
        );
    }
}

/// Compute the diff between `existing` sensors and the `desired` selection
pub fn reconcile(existing: &[Sensor], desired: &DesiredSensors) -> SensorDiff {
    let mut diff = SensorDiff::default();

    for (&measurement_type, entity_ids) in desired {
        let mut seen: HashSet<&str> = HashSet::with_capacity(entity_ids.len());

        for entity_id in entity_ids {
            if !seen.insert(entity_id.as_str()) {
                continue;
            }
            let in_use = existing.iter().any(|s| s.matches(measurement_type, entity_id));
            if !in_use {
                diff.to_add.push((measurement_type, entity_id.clone()));
            }
        }

        diff.to_remove.extend(
            existing
                .iter()
                .filter(|s| s.measurement_type == measurement_type)
                .filter(|s| match s.entity_id.as_deref() {
                    Some(entity_id) => !seen.contains(entity_id),
                    None => true,
                })
                .cloned(),
        );
    }

    diff
}
