// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::Error;
use crate::temperature::{Temperature, TemperatureUnit};

use super::heatmaps::{HeatmapDefinition, HeatmapRegistry};
use super::range::TemperatureRangeTracker;
use super::table::ColormapTable;

fn default_heatmap() -> String {
    "classic".to_string()
}

fn default_resolution() -> usize {
    ColormapTable::DEFAULT_RESOLUTION
}

fn default_min_temperature() -> Temperature {
    Temperature::Celsius(25.0)
}

fn default_max_temperature() -> Temperature {
    Temperature::Celsius(45.0)
}

/// Settings controlling how temperatures are turned into colors.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RenderSettings {
    /// The name of the heatmap to use.
    #[serde(default = "default_heatmap")]
    pub(crate) heatmap: String,

    /// The number of entries in the colormap table.
    #[serde(default = "default_resolution")]
    pub(crate) resolution: usize,

    /// The largest distance the displayed range is dragged towards the frame range, per frame.
    ///
    /// 0 keeps the range fixed.
    #[serde(default)]
    pub(crate) temp_skew: f32,

    /// The temperature mapped to the first color (at least initially).
    #[serde(default = "default_min_temperature")]
    pub(crate) min_temperature: Temperature,

    /// The temperature mapped to the last color (at least initially).
    #[serde(default = "default_max_temperature")]
    pub(crate) max_temperature: Temperature,

    /// The unit temperatures are printed in.
    #[serde(default)]
    pub(crate) units: TemperatureUnit,

    /// Extra heatmaps, keyed by name.
    #[serde(default)]
    pub(crate) heatmaps: HashMap<String, HeatmapDefinition>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            heatmap: default_heatmap(),
            resolution: default_resolution(),
            temp_skew: 0.0,
            min_temperature: default_min_temperature(),
            max_temperature: default_max_temperature(),
            units: TemperatureUnit::default(),
            heatmaps: HashMap::new(),
        }
    }
}

impl RenderSettings {
    /// Check the values that can't be checked while deserializing.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if !(self.temp_skew.is_finite() && self.temp_skew >= 0.0) {
            return Err(Error::InvalidSkew(self.temp_skew));
        }
        if self.resolution == 0 {
            return Err(Error::InvalidResolution(self.resolution));
        }
        Ok(())
    }

    pub(crate) fn registry(&self) -> Result<HeatmapRegistry, Error> {
        HeatmapRegistry::with_definitions(&self.heatmaps)
    }

    /// Look up the configured heatmap and bake it into a table.
    pub(crate) fn build_table(&self) -> Result<ColormapTable, Error> {
        self.validate()?;
        let registry = self.registry()?;
        debug!(
            known = ?registry.names().collect::<Vec<_>>(),
            heatmap = %self.heatmap,
            "looking up heatmap"
        );
        let heatmap = registry.get(&self.heatmap)?;
        let table = ColormapTable::build(&heatmap, self.resolution)?;
        debug!(
            entries = table.len(),
            first = %format!("{:x}", table.first()),
            last = %format!("{:x}", table.last()),
            "built colormap"
        );
        Ok(table)
    }

    pub(crate) fn tracker(&self) -> TemperatureRangeTracker {
        TemperatureRangeTracker::new(
            self.min_temperature.in_celsius(),
            self.max_temperature.in_celsius(),
        )
    }
}
