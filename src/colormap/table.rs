// SPDX-License-Identifier: GPL-3.0-or-later
use std::ops::Index;

use crate::error::Error;
use crate::frame::{PixelFrame, TemperatureFrame};
use crate::util::{constrain, map_value};

use super::color::Color;
use super::gradient::Heatmap;

/// A heatmap baked into a fixed number of colors.
///
/// Built once per run; temperatures are quantized into an index into this table.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ColormapTable {
    colors: Vec<Color>,
}

impl ColormapTable {
    pub(crate) const DEFAULT_RESOLUTION: usize = 1000;

    pub(crate) fn build(heatmap: &Heatmap, resolution: usize) -> Result<Self, Error> {
        if resolution == 0 {
            return Err(Error::InvalidResolution(resolution));
        }
        let width = resolution as f64;
        let colors = (0..resolution)
            .map(|i| heatmap.color_at(i as f64, width))
            .collect();
        Ok(Self { colors })
    }

    pub(crate) fn len(&self) -> usize {
        self.colors.len()
    }

    pub(crate) fn first(&self) -> Color {
        self.colors[0]
    }

    pub(crate) fn last(&self) -> Color {
        self.colors[self.colors.len() - 1]
    }

    /// The table index a temperature falls into, given the current display range.
    ///
    /// Temperatures at or below `low` saturate to the first entry, and those at or above `high`
    /// saturate to the last. If `low` and `high` are equal there is no range to map across, so
    /// every temperature lands on the middle entry. NaN temperatures map to the first entry.
    pub(crate) fn index_for(&self, temperature: f32, low: f32, high: f32) -> usize {
        let top = (self.colors.len() - 1) as f64;
        if low == high {
            return (self.colors.len() - 1) / 2;
        }
        let index = map_value(temperature as f64, low as f64, high as f64, 0.0, top);
        constrain(index, 0.0, top) as usize
    }

    pub(crate) fn color_for(&self, temperature: f32, low: f32, high: f32) -> Color {
        self.colors[self.index_for(temperature, low, high)]
    }
}

impl Index<usize> for ColormapTable {
    type Output = Color;

    fn index(&self, index: usize) -> &Self::Output {
        &self.colors[index]
    }
}

/// Map every reading in a frame through the display range and colormap.
pub(crate) fn render(
    frame: &TemperatureFrame,
    table: &ColormapTable,
    low: f32,
    high: f32,
) -> PixelFrame {
    PixelFrame::from_colors(
        frame
            .readings()
            .iter()
            .map(|temperature| table.color_for(*temperature, low, high)),
    )
}
