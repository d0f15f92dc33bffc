// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use linux_embedded_hal::I2cdev;
use serde::de::{Deserialize, Deserializer, Error};
use tracing::{info, warn};

use super::i2c::Bus;
use super::mock_camera::{MockCamera, RepeatMode};
use super::source::{FrameSource, RetryPolicy};
use super::thermal_camera::{self, ThermalCamera};

/// The type for the map of extra keys found in a camera config.
type ExtraMap = HashMap<String, toml::Value>;

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_retry_backoff_ms() -> u64 {
    RetryPolicy::default().initial_backoff.as_millis() as u64
}

fn default_warmup_frames() -> u32 {
    1
}

fn default_address() -> u8 {
    0x33
}

fn default_mlx_frame_rate() -> mlx9064x::FrameRate {
    mlx9064x::FrameRate::One
}

fn default_mock_frame_rate() -> f32 {
    1.0
}

fn try_from_f32<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<f32>,
    <T as TryFrom<f32>>::Error: fmt::Display,
{
    let value = f32::deserialize(deserializer)?;
    T::try_from(value).map_err(D::Error::custom)
}

/// Settings shared by every kind of camera.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub(crate) struct CommonCameraSettings {
    #[serde(default)]
    pub(crate) flip_horizontal: bool,

    #[serde(default)]
    pub(crate) flip_vertical: bool,

    /// Consecutive failed reads to retry before giving up.
    #[serde(default = "default_max_retries")]
    pub(crate) max_retries: u32,

    /// The wait after the first failed read, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub(crate) retry_backoff_ms: u64,

    /// Frames thrown away before the first one is used.
    #[serde(default = "default_warmup_frames")]
    pub(crate) warmup_frames: u32,

    // By annotating this field with 'flatten', any unknown keys will be collected into this map.
    #[serde(default, flatten)]
    extra: ExtraMap,
}

impl Default for CommonCameraSettings {
    fn default() -> Self {
        Self {
            flip_horizontal: false,
            flip_vertical: false,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            warmup_frames: default_warmup_frames(),
            extra: ExtraMap::default(),
        }
    }
}

impl CommonCameraSettings {
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub(crate) enum CameraSettings {
    Mlx90640 {
        bus: Bus,

        #[serde(default = "default_address")]
        address: u8,

        #[serde(default = "default_mlx_frame_rate", deserialize_with = "try_from_f32")]
        frame_rate: mlx9064x::FrameRate,

        #[serde(flatten)]
        common: CommonCameraSettings,
    },
    Mock {
        path: PathBuf,

        #[serde(default = "default_mock_frame_rate")]
        frame_rate: f32,

        #[serde(default)]
        repeat_mode: RepeatMode,

        #[serde(flatten)]
        common: CommonCameraSettings,
    },
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self::Mlx90640 {
            bus: Bus::Number(1),
            address: default_address(),
            frame_rate: default_mlx_frame_rate(),
            common: CommonCameraSettings::default(),
        }
    }
}

impl CameraSettings {
    /// Convenience method for accessing common camera settings.
    pub(crate) fn common(&self) -> &CommonCameraSettings {
        match self {
            Self::Mlx90640 { common, .. } => common,
            Self::Mock { common, .. } => common,
        }
    }

    #[cfg(test)]
    pub(crate) fn common_mut(&mut self) -> &mut CommonCameraSettings {
        match self {
            Self::Mlx90640 { common, .. } => common,
            Self::Mock { common, .. } => common,
        }
    }

    pub(crate) fn frame_rate(&self) -> f32 {
        match self {
            Self::Mlx90640 { frame_rate, .. } => f32::from(*frame_rate),
            Self::Mock { frame_rate, .. } => *frame_rate,
        }
    }

    pub(crate) fn set_frame_rate(&mut self, rate: f32) -> anyhow::Result<()> {
        match self {
            Self::Mlx90640 { frame_rate, .. } => {
                *frame_rate = mlx9064x::FrameRate::try_from(rate)
                    .map_err(|err| anyhow!("Invalid frame rate {}: {}", rate, err))?;
            }
            Self::Mock { frame_rate, .. } => {
                if !(rate > 0.0) || Duration::try_from_secs_f64(1.0 / f64::from(rate)).is_err() {
                    return Err(anyhow!("Invalid frame rate {}", rate));
                }
                *frame_rate = rate;
            }
        }
        Ok(())
    }

    pub(crate) fn set_bus(&mut self, new_bus: Bus) -> anyhow::Result<()> {
        match self {
            Self::Mlx90640 { bus, .. } => {
                *bus = new_bus;
                Ok(())
            }
            Self::Mock { .. } => Err(anyhow!("An I2C bus can't be used with a mock camera")),
        }
    }

    /// Swap the camera for a recording, keeping the common settings.
    pub(crate) fn replace_with_mock(&mut self, path: PathBuf) {
        let frame_rate = self.frame_rate();
        let common = self.common().clone();
        *self = Self::Mock {
            path,
            frame_rate,
            repeat_mode: RepeatMode::default(),
            common,
        };
    }

    /// How long to wait before asking a camera that isn't ready again.
    fn poll_interval(&self) -> Duration {
        let period = Duration::from_secs_f32(1.0 / self.frame_rate().max(0.01));
        (period / 8).max(Duration::from_millis(1))
    }

    pub(crate) fn create_camera(&self) -> anyhow::Result<Box<dyn ThermalCamera + Send>> {
        let mut camera: Box<dyn ThermalCamera + Send> = match self {
            Self::Mlx90640 { bus, address, .. } => {
                info!(bus = %bus, address, "opening MLX90640");
                let i2c = I2cdev::try_from(bus).context("Unable to connect to I2C bus")?;
                let driver = mlx9064x::Mlx90640Driver::new(i2c, *address)
                    .context("Unable to initialize MLX90640")?;
                Box::new(thermal_camera::Mlx90640::new(driver))
            }
            Self::Mock {
                path, repeat_mode, ..
            } => {
                info!(path = %path.display(), %repeat_mode, "replaying recording");
                Box::new(MockCamera::from_path(path, *repeat_mode)?)
            }
        };
        camera.set_frame_rate(self.frame_rate())?;
        Ok(camera)
    }

    /// Open the camera and wrap it up with the retry, warm-up, and orientation settings.
    pub(crate) fn frame_source(&self) -> anyhow::Result<FrameSource> {
        let common = self.common();
        for key in common.extra.keys() {
            warn!(key = key.as_str(), "ignoring unknown camera setting");
        }
        let camera = self.create_camera()?;
        Ok(FrameSource::new(camera, common.retry_policy())
            .with_poll_interval(self.poll_interval())
            .with_warmup(common.warmup_frames)
            .with_flips(common.flip_horizontal, common.flip_vertical))
    }
}
