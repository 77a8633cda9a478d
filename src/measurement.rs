//! Measurement types, device classes and temperature units
//!
//! The network only accepts a fixed set of physical quantities. Each one is
//! bound to exactly one host device class, and temperatures are always
//! contributed in degrees Celsius.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a physical quantity contributed to the network
///
/// The declaration order is the reconciliation order; keep [`MeasurementType::ALL`]
/// in sync with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    AmbientTemperature,
    RelativeHumidity,
}

impl MeasurementType {
    /// All measurement types in their fixed enumeration order
    pub const ALL: [MeasurementType; 2] = [
        MeasurementType::AmbientTemperature,
        MeasurementType::RelativeHumidity,
    ];

    /// Device class a host entity must report to contribute this type
    pub fn device_class(&self) -> DeviceClass {
        match self {
            MeasurementType::AmbientTemperature => DeviceClass::Temperature,
            MeasurementType::RelativeHumidity => DeviceClass::Humidity,
        }
    }

    /// Key of the sensor selection for this type in the entry options
    pub fn options_key(&self) -> &'static str {
        match self {
            MeasurementType::AmbientTemperature => "outdoor_temperature_sensors",
            MeasurementType::RelativeHumidity => "outdoor_relative_humidity_sensors",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::AmbientTemperature => "ambient_temperature",
            MeasurementType::RelativeHumidity => "relative_humidity",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-side device class of a sensor entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Humidity,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Temperature => "temperature",
            DeviceClass::Humidity => "humidity",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(DeviceClass::Temperature),
            "humidity" => Ok(DeviceClass::Humidity),
            other => Err(format!("unsupported device class '{other}'")),
        }
    }
}

/// Recognized units of temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Kelvin => "K",
        }
    }

    /// Convert a value in this unit to degrees Celsius
    pub fn to_celsius(&self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => value,
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            TemperatureUnit::Kelvin => value - 273.15,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "°C" => Ok(TemperatureUnit::Celsius),
            "°F" => Ok(TemperatureUnit::Fahrenheit),
            "K" => Ok(TemperatureUnit::Kelvin),
            other => Err(format!("unrecognized temperature unit '{other}'")),
        }
    }
}
