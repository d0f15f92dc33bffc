// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context as _};
use serde::de::{Deserialize, IntoDeserializer};
use tracing::{debug, trace};

use crate::frame::TemperatureFrame;

use super::thermal_camera::{Reading, ThermalCamera};

/// The on-disk format of a recording: a list of frames, each a list of 768 readings.
#[derive(Debug, serde::Deserialize)]
struct Recording {
    frames: Vec<Vec<f32>>,
}

/// Controls how frames are repeated by [`MockCamera`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RepeatMode {
    /// Once the end of the recording has been reached, the camera is finished.
    Once,

    /// Once the end of the recording has been reached, playback restarts from the beginning. This
    /// is the default mode.
    Loop,
}

impl Default for RepeatMode {
    fn default() -> Self {
        Self::Loop
    }
}

impl FromStr for RepeatMode {
    type Err = serde::de::value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepeatMode::deserialize(s.into_deserializer())
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepeatMode::Once => "once",
            RepeatMode::Loop => "loop",
        };
        write!(f, "{}", s)
    }
}

/// A camera that replays previously recorded frames at a fixed frame rate.
pub(crate) struct MockCamera {
    frames: Vec<TemperatureFrame>,
    index: Box<dyn Iterator<Item = usize> + Send + Sync>,
    period: Duration,
    next_due: Option<Instant>,
}

impl MockCamera {
    pub(crate) fn new(frames: Vec<TemperatureFrame>, repeat: RepeatMode) -> Self {
        let num_frames = frames.len();
        let index: Box<dyn Iterator<Item = usize> + Send + Sync> = match repeat {
            RepeatMode::Once => Box::new(0..num_frames),
            RepeatMode::Loop => Box::new((0..num_frames).cycle()),
        };
        Self {
            frames,
            index,
            period: Duration::from_secs(1),
            next_due: None,
        }
    }

    /// Load a recording from a TOML file.
    pub(crate) fn from_path(path: &Path, repeat: RepeatMode) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read recording {}", path.display()))?;
        let recording: Recording = toml::from_str(&contents)
            .with_context(|| format!("Unable to parse recording {}", path.display()))?;
        let frames = recording
            .frames
            .into_iter()
            .enumerate()
            .map(|(n, readings)| {
                TemperatureFrame::from_vec(readings)
                    .with_context(|| format!("Invalid frame {} in {}", n, path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        debug!(count = frames.len(), path = %path.display(), "loaded recording");
        Ok(Self::new(frames, repeat))
    }
}

impl ThermalCamera for MockCamera {
    fn thermal_image(&mut self) -> anyhow::Result<Reading> {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if now < due {
                return Ok(Reading::NotReady);
            }
        }
        let index = match self.index.next() {
            Some(index) => index,
            None => return Ok(Reading::Finished),
        };
        trace!(index, "replaying frame");
        self.next_due = Some(now + self.period);
        Ok(Reading::Frame(self.frames[index].clone()))
    }

    fn set_frame_rate(&mut self, frame_rate: f32) -> anyhow::Result<()> {
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(anyhow!("Invalid frame rate {}", frame_rate));
        }
        self.period = Duration::try_from_secs_f64(1.0 / f64::from(frame_rate))
            .map_err(|err| anyhow!("Invalid frame rate {}: {}", frame_rate, err))?;
        Ok(())
    }
}
