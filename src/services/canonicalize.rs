//! Unit and validation adapter
//!
//! Turns a raw host reading into the canonical value contributed to the
//! network. Rejections are local to one sensor and one polling cycle.

use crate::measurement::{DeviceClass, MeasurementType, TemperatureUnit};
use thiserror::Error;

/// Host state values that mean the entity currently has no reading
pub const ABSENT_STATES: [&str; 2] = ["unavailable", "unknown"];

/// Reason a reading cannot be contributed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("wrong device class (expected {expected}, got {actual})")]
    WrongDeviceClass {
        expected: DeviceClass,
        actual: String,
    },

    #[error("wrong unit of measurement '{0}'")]
    WrongUnit(String),

    #[error("non-numeric state '{0}'")]
    NonNumeric(String),
}

/// Validate a raw reading and convert it to its canonical value
///
/// Returns `Ok(None)` for an unavailable/unknown state: the sensor is still
/// reported so consumers learn it went silent.
pub fn canonicalize(
    raw_value: &str,
    raw_unit: Option<&str>,
    raw_device_class: Option<&str>,
    measurement_type: MeasurementType,
) -> Result<Option<f64>, RejectReason> {
    let expected = measurement_type.device_class();
    let device_class = raw_device_class
        .and_then(|c| c.parse::<DeviceClass>().ok())
        .filter(|c| *c == expected)
        .ok_or_else(|| RejectReason::WrongDeviceClass {
            expected,
            actual: raw_device_class.unwrap_or("none").to_string(),
        })?;

    let temperature_unit = if measurement_type == MeasurementType::AmbientTemperature {
        let unit = raw_unit.unwrap_or_default();
        Some(
            unit.parse::<TemperatureUnit>()
                .map_err(|_| RejectReason::WrongUnit(unit.to_string()))?,
        )
    } else {
        None
    };

    if ABSENT_STATES.contains(&raw_value) {
        return Ok(None);
    }

    let value: f64 = raw_value
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| RejectReason::NonNumeric(raw_value.to_string()))?;

    match (device_class, temperature_unit) {
        (DeviceClass::Temperature, Some(unit)) => Ok(Some(unit.to_celsius(value))),
        _ => Ok(Some(value)),
    }
}
