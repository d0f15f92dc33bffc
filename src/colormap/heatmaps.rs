// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::HashMap;
use std::f64::consts::PI;

use serde::Deserialize;
use tracing::debug;

use crate::error::Error;

use super::gradient::{ControlPoint, Heatmap};

/// How many control points are sampled from a `colorous` gradient.
const COLOROUS_SAMPLES: usize = 9;

/// A heatmap as written in a configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct HeatmapDefinition {
    points: Vec<ControlPoint>,

    #[serde(default = "HeatmapDefinition::default_spread")]
    spread: f64,
}

impl HeatmapDefinition {
    fn default_spread() -> f64 {
        Heatmap::DEFAULT_SPREAD
    }
}

/// An immutable mapping of heatmap names to heatmaps.
///
/// Lookups are case-insensitive. Names that aren't registered fall back to the named gradients
/// from [`colorous`].
#[derive(Clone, Debug)]
pub(crate) struct HeatmapRegistry {
    heatmaps: HashMap<String, Heatmap>,
}

impl HeatmapRegistry {
    /// The registry of the builtin heatmaps: `classic`, `grayscale`, and `enby`.
    pub(crate) fn builtin() -> Self {
        let builtins = vec![
            ("classic", classic()),
            ("grayscale", grayscale()),
            ("enby", enby()),
        ];
        let heatmaps = builtins
            .into_iter()
            .map(|(name, points)| {
                let heatmap = Heatmap::new(points, Heatmap::DEFAULT_SPREAD)
                    .expect("builtin heatmaps to be valid");
                (name.to_string(), heatmap)
            })
            .collect();
        Self { heatmaps }
    }

    /// The builtin heatmaps, plus user-defined ones. User definitions replace builtins with the
    /// same name.
    pub(crate) fn with_definitions<'a, I>(definitions: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a String, &'a HeatmapDefinition)>,
    {
        let mut registry = Self::builtin();
        for (name, definition) in definitions {
            let heatmap = Heatmap::new(definition.points.clone(), definition.spread).map_err(
                |err| match err {
                    Error::InvalidHeatmap(reason) => {
                        Error::InvalidHeatmap(format!("\"{}\": {}", name, reason))
                    }
                    other => other,
                },
            )?;
            debug!(name = name.as_str(), "registered heatmap");
            registry.heatmaps.insert(name.to_lowercase(), heatmap);
        }
        Ok(registry)
    }

    pub(crate) fn get(&self, name: &str) -> Result<Heatmap, Error> {
        if let Some(heatmap) = self.heatmaps.get(&name.to_lowercase()) {
            return Ok(heatmap.clone());
        }
        colorous_gradient(name)
            .map(sample_gradient)
            .ok_or_else(|| Error::UnknownHeatmap(name.to_string()))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.heatmaps.keys().map(String::as_str)
    }
}

impl Default for HeatmapRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn classic() -> Vec<ControlPoint> {
    vec![
        ControlPoint::new(0.0, [0.0, 0.0, 0.0]),
        ControlPoint::new(0.2, [0.0, 0.0, 0.5]),
        ControlPoint::new(0.4, [0.0, 0.5, 0.0]),
        ControlPoint::new(0.6, [0.5, 0.0, 0.0]),
        ControlPoint::new(0.8, [0.75, 0.75, 0.0]),
        ControlPoint::new(0.9, [1.0, 0.75, 0.0]),
        ControlPoint::new(1.0, [1.0, 1.0, 1.0]),
    ]
}

fn grayscale() -> Vec<ControlPoint> {
    vec![
        ControlPoint::new(0.0, [0.0, 0.0, 0.0]),
        ControlPoint::new(1.0, [1.0, 1.0, 1.0]),
    ]
}

fn enby() -> Vec<ControlPoint> {
    vec![
        ControlPoint::from_rgb8(0.0, [44, 44, 44]),
        ControlPoint::from_rgb8(0.3333333333333, [252, 244, 52]),
        ControlPoint::from_rgb8(0.6666666666666, [252, 252, 252]),
        ControlPoint::from_rgb8(1.0, [156, 89, 209]),
    ]
}

/// Approximate a `colorous` gradient with evenly spaced control points.
///
/// The spread is picked so that the overlapping kernels sum to roughly unit gain in the interior
/// of the gradient, instead of washing out to white.
fn sample_gradient(gradient: colorous::Gradient) -> Heatmap {
    let last = COLOROUS_SAMPLES - 1;
    let points = (0..COLOROUS_SAMPLES)
        .map(|i| {
            let color = gradient.eval_rational(i, COLOROUS_SAMPLES);
            ControlPoint::from_rgb8(i as f64 / last as f64, [color.r, color.g, color.b])
        })
        .collect();
    let spread = (2.0 * PI).sqrt() * last as f64 / COLOROUS_SAMPLES as f64;
    Heatmap::new(points, spread).expect("sampled colorous gradients to be valid")
}

fn colorous_gradient(gradient_name: &str) -> Option<colorous::Gradient> {
    match &gradient_name.to_uppercase().replace(" ", "_") as &str {
        "BLUES" => Some(colorous::BLUES),
        "BLUE_GREEN" => Some(colorous::BLUE_GREEN),
        "BLUE_PURPLE" => Some(colorous::BLUE_PURPLE),
        "BROWN_GREEN" => Some(colorous::BROWN_GREEN),
        "CIVIDIS" => Some(colorous::CIVIDIS),
        "COOL" => Some(colorous::COOL),
        "CUBEHELIX" => Some(colorous::CUBEHELIX),
        "GREENS" => Some(colorous::GREENS),
        "GREEN_BLUE" => Some(colorous::GREEN_BLUE),
        "GREYS" => Some(colorous::GREYS),
        "INFERNO" => Some(colorous::INFERNO),
        "MAGMA" => Some(colorous::MAGMA),
        "ORANGES" => Some(colorous::ORANGES),
        "ORANGE_RED" => Some(colorous::ORANGE_RED),
        "PINK_GREEN" => Some(colorous::PINK_GREEN),
        "PLASMA" => Some(colorous::PLASMA),
        "PURPLES" => Some(colorous::PURPLES),
        "PURPLE_BLUE" => Some(colorous::PURPLE_BLUE),
        "PURPLE_BLUE_GREEN" => Some(colorous::PURPLE_BLUE_GREEN),
        "PURPLE_GREEN" => Some(colorous::PURPLE_GREEN),
        "PURPLE_ORANGE" => Some(colorous::PURPLE_ORANGE),
        "PURPLE_RED" => Some(colorous::PURPLE_RED),
        "RAINBOW" => Some(colorous::RAINBOW),
        "REDS" => Some(colorous::REDS),
        "RED_BLUE" => Some(colorous::RED_BLUE),
        "RED_GREY" => Some(colorous::RED_GREY),
        "RED_PURPLE" => Some(colorous::RED_PURPLE),
        "RED_YELLOW_BLUE" => Some(colorous::RED_YELLOW_BLUE),
        "RED_YELLOW_GREEN" => Some(colorous::RED_YELLOW_GREEN),
        "SINEBOW" => Some(colorous::SINEBOW),
        "SPECTRAL" => Some(colorous::SPECTRAL),
        "TURBO" => Some(colorous::TURBO),
        "VIRIDIS" => Some(colorous::VIRIDIS),
        "WARM" => Some(colorous::WARM),
        "YELLOW_GREEN" => Some(colorous::YELLOW_GREEN),
        "YELLOW_GREEN_BLUE" => Some(colorous::YELLOW_GREEN_BLUE),
        "YELLOW_ORANGE_BROWN" => Some(colorous::YELLOW_ORANGE_BROWN),
        "YELLOW_ORANGE_RED" => Some(colorous::YELLOW_ORANGE_RED),
        _ => None,
    }
}
