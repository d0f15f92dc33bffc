// SPDX-License-Identifier: GPL-3.0-or-later
mod color;
mod gradient;
mod heatmaps;
mod range;
mod settings;
mod table;

pub(crate) use color::Color;
pub(crate) use range::TemperatureRangeTracker;
pub(crate) use settings::RenderSettings;
pub(crate) use table::{render, ColormapTable};

#[cfg(test)]
pub(crate) use gradient::{ControlPoint, Heatmap};
#[cfg(test)]
pub(crate) use heatmaps::HeatmapRegistry;
