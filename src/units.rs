use std::{fmt::Display, str::FromStr};

use serde::{de, Deserialize, Serialize};

/// Number of pascals in one bar.
pub const PA_PER_BAR: f64 = 1e5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error("Pressure unit '{0}' is not implemented, can currently only deal with Pa or bar")]
    NotImplemented(String),
}

/// The pressure units a dataset may be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressureUnit {
    Pa,
    Bar,
}

impl PressureUnit {
    /// Factor to multiply a pressure in this unit by to get bar.
    pub fn to_bar_factor(&self) -> f64 {
        match self {
            PressureUnit::Pa => 1.0 / PA_PER_BAR,
            PressureUnit::Bar => 1.0,
        }
    }

    /// Convert a single pressure value from `self` to `goal`.
    pub fn convert(&self, value: f64, goal: PressureUnit) -> f64 {
        match (self, goal) {
            (PressureUnit::Pa, PressureUnit::Bar) => value / PA_PER_BAR,
            (PressureUnit::Bar, PressureUnit::Pa) => value * PA_PER_BAR,
            _ => value,
        }
    }

    /// Convert a pressure given in bar into this unit.
    pub fn from_bar(&self, value_bar: f64) -> f64 {
        PressureUnit::Bar.convert(value_bar, *self)
    }

    /// Convert a pressure given in this unit into bar.
    pub fn to_bar(&self, value: f64) -> f64 {
        self.convert(value, PressureUnit::Bar)
    }
}

impl Display for PressureUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PressureUnit::Pa => write!(f, "Pa"),
            PressureUnit::Bar => write!(f, "bar"),
        }
    }
}

impl FromStr for PressureUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pa" => Ok(Self::Pa),
            "bar" => Ok(Self::Bar),
            _ => Err(UnitError::NotImplemented(s.to_string())),
        }
    }
}

impl Serialize for PressureUnit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: serde::Serializer
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PressureUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: serde::Deserializer<'de>
    {
        let s = String::deserialize(deserializer)?;
        PressureUnit::from_str(&s).map_err(|e| de::Error::custom(format!("{e}")))
    }
}
