// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;

use serde::Deserialize;

use crate::error::Error;
use crate::util::constrain;

use super::color::Color;

/// Anchors a gradient color at a normalized position.
///
/// In configuration files the color is given either as unit floats (`color = [0.0, 0.5, 1.0]`)
/// or as 8-bit integers (`rgb = [44, 44, 44]`).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(try_from = "RawControlPoint")]
pub(crate) struct ControlPoint {
    pub(crate) position: f64,
    pub(crate) color: [f64; 3],
}

impl ControlPoint {
    pub(crate) const fn new(position: f64, color: [f64; 3]) -> Self {
        Self { position, color }
    }

    /// Create a control point from 8-bit color values.
    pub(crate) fn from_rgb8(position: f64, rgb: [u8; 3]) -> Self {
        let [r, g, b] = rgb;
        Self::new(
            position,
            [r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0],
        )
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawControlPoint {
    position: f64,
    #[serde(default)]
    color: Option<[f64; 3]>,
    #[serde(default)]
    rgb: Option<[u8; 3]>,
}

impl TryFrom<RawControlPoint> for ControlPoint {
    type Error = &'static str;

    fn try_from(raw: RawControlPoint) -> Result<Self, Self::Error> {
        match (raw.color, raw.rgb) {
            (Some(color), None) => Ok(Self::new(raw.position, color)),
            (None, Some(rgb)) => Ok(Self::from_rgb8(raw.position, rgb)),
            (Some(_), Some(_)) => Err("only one of `color` or `rgb` may be given"),
            (None, None) => Err("a control point needs either `color` or `rgb`"),
        }
    }
}

/// An ordered list of control points, blended into a continuous gradient with Gaussian kernels.
///
/// Each control point contributes its color weighted by a Gaussian centered on its position. The
/// width of every kernel is `1 / (spread * points.len())` of the gradient, so more control points
/// (or a larger spread) give each point a narrower influence.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Heatmap {
    points: Vec<ControlPoint>,
    spread: f64,
}

impl Heatmap {
    pub(crate) const DEFAULT_SPREAD: f64 = 1.0;

    /// Validate and create a heatmap.
    ///
    /// The first point must be at 0.0, the last at 1.0, positions may not decrease, and every
    /// position and color channel must be within `[0, 1]`.
    pub(crate) fn new(points: Vec<ControlPoint>, spread: f64) -> Result<Self, Error> {
        let invalid = |reason: String| Err(Error::InvalidHeatmap(reason));
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return invalid("no control points given".to_string()),
        };
        if !(spread.is_finite() && spread > 0.0) {
            return invalid(format!("spread must be positive (given {})", spread));
        }
        if first.position != 0.0 {
            return invalid(format!(
                "the first control point must be at 0.0 (given {})",
                first.position
            ));
        }
        if last.position != 1.0 {
            return invalid(format!(
                "the last control point must be at 1.0 (given {})",
                last.position
            ));
        }
        for (index, point) in points.iter().enumerate() {
            if !(0.0..=1.0).contains(&point.position) {
                return invalid(format!("control point {} is outside [0, 1]", index));
            }
            if point.color.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return invalid(format!(
                    "control point {} has a color channel outside [0, 1]",
                    index
                ));
            }
        }
        if points
            .windows(2)
            .any(|pair| pair[1].position < pair[0].position)
        {
            return invalid("control point positions must not decrease".to_string());
        }
        Ok(Self { points, spread })
    }

    #[cfg(test)]
    pub(crate) fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    #[cfg(test)]
    pub(crate) fn spread(&self) -> f64 {
        self.spread
    }

    /// Evaluate the gradient at `x`, where the gradient spans `[0, width]`.
    pub(crate) fn color_at(&self, x: f64, width: f64) -> Color {
        let sigma = width / (self.spread * self.points.len() as f64);
        let mut channels = [0u8; 3];
        for (channel, out) in channels.iter_mut().enumerate() {
            let sum: f64 = self
                .points
                .iter()
                .map(|p| gaussian(x, p.color[channel], p.position * width, sigma))
                .sum();
            // Truncation is intentional, matching a plain integer conversion.
            *out = constrain(sum * 255.0, 0.0, 255.0) as u8;
        }
        Color::from(channels)
    }
}

fn gaussian(x: f64, amplitude: f64, mean: f64, sigma: f64) -> f64 {
    amplitude * (-(x - mean).powi(2) / (2.0 * sigma.powi(2))).exp()
}
