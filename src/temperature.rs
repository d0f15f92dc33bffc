// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl Default for TemperatureUnit {
    fn default() -> Self {
        Self::Celsius
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        })
    }
}

impl FromStr for TemperatureUnit {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_ascii_lowercase() as &str {
            "celsius" | "c" => Ok(TemperatureUnit::Celsius),
            "fahrenheit" | "f" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err("unknown temperature unit"),
        }
    }
}

/// A temperature with its unit attached.
///
/// The sensor reports Celsius, and everything in the colorizing core works in Celsius, but
/// configuration values may be given in either unit. In a config file a bare number is Celsius,
/// otherwise a single-entry table names the unit (`{ fahrenheit = 113 }`).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(from = "DeserializedTemperature")]
pub(crate) enum Temperature {
    Celsius(f32),
    Fahrenheit(f32),
}

impl Temperature {
    pub(crate) fn in_celsius(&self) -> f32 {
        match self {
            Self::Celsius(c) => *c,
            Self::Fahrenheit(f) => (f - 32.0) * 5.0 / 9.0,
        }
    }

    pub(crate) fn in_fahrenheit(&self) -> f32 {
        match self {
            Self::Celsius(c) => c * 1.8 + 32.0,
            Self::Fahrenheit(f) => *f,
        }
    }

    pub(crate) fn in_unit(&self, unit: TemperatureUnit) -> f32 {
        match unit {
            TemperatureUnit::Celsius => self.in_celsius(),
            TemperatureUnit::Fahrenheit => self.in_fahrenheit(),
        }
    }

    /// The same temperature, expressed in `unit`.
    pub(crate) fn to_unit(self, unit: TemperatureUnit) -> Self {
        match unit {
            TemperatureUnit::Celsius => Self::Celsius(self.in_celsius()),
            TemperatureUnit::Fahrenheit => Self::Fahrenheit(self.in_fahrenheit()),
        }
    }

    pub(crate) fn unit(&self) -> TemperatureUnit {
        match self {
            Self::Celsius(_) => TemperatureUnit::Celsius,
            Self::Fahrenheit(_) => TemperatureUnit::Fahrenheit,
        }
    }
}

impl From<f32> for Temperature {
    fn from(value: f32) -> Self {
        Self::Celsius(value)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.in_unit(self.unit()), fmt)?;
        write!(fmt, "°{}", self.unit())
    }
}

/// Parses `25`, `25C`, `25°C`, or `77F`. Bare numbers are Celsius.
impl FromStr for Temperature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (number, unit) = match trimmed.char_indices().last() {
            Some((idx, suffix)) if suffix.is_ascii_alphabetic() => {
                let unit: TemperatureUnit = trimmed[idx..].parse().map_err(String::from)?;
                (trimmed[..idx].trim_end_matches('°'), unit)
            }
            _ => (trimmed, TemperatureUnit::Celsius),
        };
        let value: f32 = number
            .trim()
            .parse()
            .map_err(|e| format!("invalid temperature \"{}\": {}", s, e))?;
        Ok(match unit {
            TemperatureUnit::Celsius => Self::Celsius(value),
            TemperatureUnit::Fahrenheit => Self::Fahrenheit(value),
        })
    }
}

// Accept either a raw number or a map of a unit to a number.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(untagged)]
enum DeserializedTemperature {
    Number(f32),
    Wrapped(TaggedTemperature),
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaggedTemperature {
    #[serde(alias = "c", alias = "C")]
    Celsius(f32),

    #[serde(alias = "f", alias = "F")]
    Fahrenheit(f32),
}

impl From<DeserializedTemperature> for Temperature {
    fn from(maybe_wrapped: DeserializedTemperature) -> Self {
        match maybe_wrapped {
            DeserializedTemperature::Number(value) => Self::Celsius(value),
            DeserializedTemperature::Wrapped(TaggedTemperature::Celsius(c)) => Self::Celsius(c),
            DeserializedTemperature::Wrapped(TaggedTemperature::Fahrenheit(f)) => {
                Self::Fahrenheit(f)
            }
        }
    }
}
