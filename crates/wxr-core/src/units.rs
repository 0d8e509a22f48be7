//! Provider unit systems and normalization to metric
//!
//! Samples are always stored in °C and m/s regardless of the unit system
//! the provider was asked to answer in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Unknown unit system: {0}")]
    UnknownUnitSystem(String),
}

/// Unit system requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// °C, m/s
    #[default]
    Metric,
    /// °F, mph
    Imperial,
    /// Kelvin, m/s
    Standard,
}

impl UnitSystem {
    /// Value of the provider's `units` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
            UnitSystem::Standard => "standard",
        }
    }

    /// Convert a temperature reported in this system to °C
    pub fn to_celsius(&self, value: f64) -> f64 {
        match self {
            UnitSystem::Metric => value,
            UnitSystem::Imperial => (value - 32.0) * 5.0 / 9.0,
            UnitSystem::Standard => value - 273.15,
        }
    }

    /// Convert a wind speed reported in this system to m/s
    pub fn to_meters_per_second(&self, value: f64) -> f64 {
        match self {
            UnitSystem::Imperial => value * 0.44704,
            UnitSystem::Metric | UnitSystem::Standard => value,
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for UnitSystem {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            "standard" => Ok(UnitSystem::Standard),
            _ => Err(UnitError::UnknownUnitSystem(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        // 32F = 0C
        let result = UnitSystem::Imperial.to_celsius(32.0);
        assert!((result - 0.0).abs() < 0.001);

        // 212F = 100C
        let result = UnitSystem::Imperial.to_celsius(212.0);
        assert!((result - 100.0).abs() < 0.001);

        let result = UnitSystem::Standard.to_celsius(273.15);
        assert!(result.abs() < 0.001);
    }

    #[test]
    fn test_metric_is_identity() {
        assert_eq!(UnitSystem::Metric.to_celsius(25.0), 25.0);
        assert_eq!(UnitSystem::Metric.to_meters_per_second(4.2), 4.2);
    }

    #[test]
    fn test_wind_speed_conversion() {
        let result = UnitSystem::Imperial.to_meters_per_second(10.0);
        assert!((result - 4.4704).abs() < 0.0001);
    }

    #[test]
    fn test_parse_unit_system() {
        assert_eq!("metric".parse::<UnitSystem>().unwrap(), UnitSystem::Metric);
        assert_eq!("Imperial".parse::<UnitSystem>().unwrap(), UnitSystem::Imperial);
        assert!("nautical".parse::<UnitSystem>().is_err());
        assert_eq!(UnitSystem::Standard.as_param(), "standard");
    }
}
