// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;
use std::error::Error as StdError;

use anyhow::{anyhow, Context as _};
use embedded_hal::blocking::i2c;
use tracing::trace;

use crate::frame::{TemperatureFrame, ThermalImage};

/// The result of asking a camera for a new image.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Reading {
    /// A complete frame, in degrees Celsius.
    Frame(TemperatureFrame),

    /// The camera doesn't have new data yet; ask again later.
    NotReady,

    /// The camera will never produce another frame.
    Finished,
}

/// The operations a thermal camera needs to have to be used by thermopipe.
pub(crate) trait ThermalCamera {
    /// Return a thermal image from a camera, if one is available.
    fn thermal_image(&mut self) -> anyhow::Result<Reading>;

    fn set_frame_rate(&mut self, frame_rate: f32) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub(crate) struct Mlx90640<I2C> {
    camera: mlx9064x::Mlx90640Driver<I2C>,
    temperature_buffer: Vec<f32>,
}

impl<I2C> Mlx90640<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: 'static + StdError + Sync + Send,
    <I2C as i2c::Write>::Error: 'static + StdError + Sync + Send,
{
    pub(crate) fn new(camera: mlx9064x::Mlx90640Driver<I2C>) -> Self {
        let num_pixels = camera.height() * camera.width();
        Self {
            camera,
            temperature_buffer: vec![0f32; num_pixels],
        }
    }
}

impl<I2C> ThermalCamera for Mlx90640<I2C>
where
    I2C: 'static + i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: 'static + StdError + Sync + Send,
    <I2C as i2c::Write>::Error: 'static + StdError + Sync + Send,
{
    fn thermal_image(&mut self) -> anyhow::Result<Reading> {
        let ready = self
            .camera
            .generate_image_if_ready(&mut self.temperature_buffer)
            .context("Error reading image from MLX90640")?;
        if !ready {
            trace!("MLX90640 data not ready");
            return Ok(Reading::NotReady);
        }
        // mlx9064x uses row-major ordering, so no swapping needed here.
        let image = ThermalImage::from_raw(
            self.camera.width() as u32,
            self.camera.height() as u32,
            self.temperature_buffer.clone(),
        )
        .ok_or_else(|| anyhow!("MLX90640 buffer does not match its dimensions"))?;
        let frame = TemperatureFrame::from_image(image)
            .context("MLX90640 returned an image of the wrong size")?;
        Ok(Reading::Frame(frame))
    }

    fn set_frame_rate(&mut self, frame_rate: f32) -> anyhow::Result<()> {
        let mlx_frame_rate = mlx9064x::FrameRate::try_from(frame_rate)
            .map_err(|err| anyhow!("Invalid frame rate {}: {}", frame_rate, err))?;
        self.camera
            .set_frame_rate(mlx_frame_rate)
            .context("Error setting camera frame rate")
    }
}
