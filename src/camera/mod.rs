// SPDX-License-Identifier: GPL-3.0-or-later
mod i2c;
mod mock_camera;
mod settings;
mod source;
mod thermal_camera;

pub(crate) use i2c::Bus;
pub(crate) use mock_camera::RepeatMode;
pub(crate) use settings::CameraSettings;

#[cfg(test)]
pub(crate) use source::{test::ScriptedCamera, FrameSource, RetryPolicy};
#[cfg(test)]
pub(crate) use thermal_camera::{Reading, ThermalCamera};
