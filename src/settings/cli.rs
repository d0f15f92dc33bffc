// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::PathBuf;

use structopt::StructOpt;

use super::Settings;
use crate::camera::{Bus, CameraSettings, RepeatMode};
use crate::error::Error;
use crate::temperature::{Temperature, TemperatureUnit};

#[derive(Debug, StructOpt)]
#[structopt(about = "Stream colorized thermal camera frames through pipes")]
pub(crate) struct Args {
    /// Path to a configuration file.
    #[structopt(short, long, parse(from_os_str))]
    pub(crate) config_path: Option<PathBuf>,

    #[structopt(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, StructOpt)]
pub(crate) enum Command {
    /// Read frames from the camera, colorize them, and write them to stdout.
    Capture {
        #[structopt(flatten)]
        camera: CameraArgs,

        #[structopt(flatten)]
        render: RenderArgs,

        /// Write bare RGB24 frames, without the stream header or length prefixes.
        #[structopt(short = "n", long)]
        headerless: bool,

        /// Don't log capture status.
        #[structopt(short, long)]
        quiet: bool,

        /// Stop after this many frames.
        #[structopt(long)]
        frames: Option<u64>,

        /// Frames between status messages.
        #[structopt(long)]
        status_interval: Option<u64>,
    },

    /// Print the temperatures from a single frame.
    Dump {
        #[structopt(flatten)]
        camera: CameraArgs,

        /// Print temperatures in this unit (celsius or fahrenheit).
        #[structopt(short, long)]
        units: Option<TemperatureUnit>,
    },

    /// Feed a frame stream into a video encoder.
    Relay(RelayArgs),
}

#[derive(Debug, Default, StructOpt)]
pub(crate) struct CameraArgs {
    /// The I2C bus the MLX90640 is on, as a number or a device path.
    #[structopt(long)]
    pub(crate) bus: Option<Bus>,

    /// Replay frames from a recording instead of using the camera.
    #[structopt(long, parse(from_os_str))]
    pub(crate) mock: Option<PathBuf>,

    /// How a recording is replayed: `once` or `loop`.
    #[structopt(long, requires = "mock")]
    pub(crate) repeat: Option<RepeatMode>,

    /// Camera frame rate, in frames per second.
    #[structopt(short = "r", long)]
    pub(crate) frame_rate: Option<f32>,
}

#[derive(Debug, Default, StructOpt)]
pub(crate) struct RenderArgs {
    /// The heatmap used to colorize frames.
    #[structopt(long)]
    pub(crate) heatmap: Option<String>,

    /// How far the temperature range may be dragged towards each frame's range. 0 fixes the range.
    #[structopt(long)]
    pub(crate) temp_skew: Option<f32>,

    /// The temperature mapped to the first color (like `25`, `25C`, or `77F`).
    #[structopt(long = "mintemp")]
    pub(crate) min_temperature: Option<Temperature>,

    /// The temperature mapped to the last color.
    #[structopt(long = "maxtemp")]
    pub(crate) max_temperature: Option<Temperature>,

    /// Number of entries in the colormap table.
    #[structopt(long)]
    pub(crate) resolution: Option<usize>,

    /// The unit temperatures are logged in.
    #[structopt(long)]
    pub(crate) units: Option<TemperatureUnit>,
}

#[derive(Debug, Default, StructOpt)]
pub(crate) struct RelayArgs {
    /// The incoming stream has a header and length prefixes.
    #[structopt(long)]
    pub(crate) framed: bool,

    /// Frame rate given to the encoder, as a decimal number.
    #[structopt(short = "r", long = "rate")]
    pub(crate) frame_rate: Option<String>,

    /// The ffmpeg filter graph.
    #[structopt(long)]
    pub(crate) filter: Option<String>,

    /// The video device ffmpeg writes to.
    #[structopt(short, long)]
    pub(crate) output: Option<String>,

    /// An encoder command to run instead of ffmpeg, split like a shell would.
    #[structopt(long)]
    pub(crate) run: Option<String>,

    /// Write frames to stdout instead of an encoder.
    #[structopt(long = "stdout")]
    pub(crate) passthrough: bool,

    /// Only show encoder errors.
    #[structopt(short, long)]
    pub(crate) quiet: bool,

    /// The command providing the frame stream, given after `--`. Frames are read from stdin if
    /// there isn't one.
    #[structopt(last = true)]
    pub(crate) source: Vec<String>,
}

impl CameraArgs {
    fn apply(&self, settings: &mut Settings) -> anyhow::Result<()> {
        if let Some(path) = &self.mock {
            settings.camera.replace_with_mock(path.clone());
        }
        if let (Some(repeat), CameraSettings::Mock { repeat_mode, .. }) =
            (self.repeat, &mut settings.camera)
        {
            *repeat_mode = repeat;
        }
        if let Some(bus) = &self.bus {
            settings.camera.set_bus(bus.clone())?;
        }
        if let Some(frame_rate) = self.frame_rate {
            settings.camera.set_frame_rate(frame_rate)?;
        }
        Ok(())
    }
}

impl RenderArgs {
    fn apply(&self, settings: &mut Settings) {
        let render = &mut settings.render;
        if let Some(heatmap) = &self.heatmap {
            render.heatmap = heatmap.clone();
        }
        if let Some(skew) = self.temp_skew {
            render.temp_skew = skew;
        }
        if let Some(low) = self.min_temperature {
            render.min_temperature = low;
        }
        if let Some(high) = self.max_temperature {
            render.max_temperature = high;
        }
        if let Some(resolution) = self.resolution {
            render.resolution = resolution;
        }
        if let Some(units) = self.units {
            render.units = units;
        }
    }
}

impl RelayArgs {
    fn apply(&self, settings: &mut Settings) -> Result<(), Error> {
        let relay = &mut settings.relay;
        relay.framed |= self.framed;
        relay.passthrough |= self.passthrough;
        relay.quiet |= self.quiet;
        if let Some(frame_rate) = &self.frame_rate {
            relay.frame_rate = frame_rate.clone();
        }
        if let Some(filter) = &self.filter {
            relay.filter = filter.clone();
        }
        if let Some(output) = &self.output {
            relay.output = output.clone();
        }
        if let Some(run) = &self.run {
            relay.run = shlex::split(run).ok_or_else(|| Error::InvalidCommand(run.clone()))?;
        }
        if !self.source.is_empty() {
            relay.source = self.source.clone();
        }
        Ok(())
    }
}

impl Command {
    /// Override values in `settings` with the ones given on the command line.
    pub(crate) fn apply(&self, settings: &mut Settings) -> anyhow::Result<()> {
        match self {
            Self::Capture {
                camera,
                render,
                headerless,
                quiet,
                status_interval,
                ..
            } => {
                camera.apply(settings)?;
                render.apply(settings);
                settings.stream.headerless |= *headerless;
                settings.stream.quiet |= *quiet;
                if let Some(interval) = status_interval {
                    settings.stream.status_interval = *interval;
                }
            }
            Self::Dump { camera, units } => {
                camera.apply(settings)?;
                if let Some(units) = units {
                    settings.render.units = *units;
                }
            }
            Self::Relay(relay) => relay.apply(settings)?,
        }
        Ok(())
    }
}
