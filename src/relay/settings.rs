// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Deserialize;

fn default_frame_rate() -> String {
    "32".to_string()
}

fn default_filter() -> String {
    "transpose=0,scale=iw*4:ih*4:flags=neighbor".to_string()
}

fn default_output() -> String {
    "/dev/video11".to_string()
}

/// Where the relay reads frames from, and where it sends them.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RelaySettings {
    /// A command (and its arguments) whose stdout carries the frame stream, typically an `ssh`
    /// invocation running `thermopipe capture` on the sensor host. Empty means stdin.
    #[serde(default)]
    pub(crate) source: Vec<String>,

    /// Whether the incoming stream has the header and length prefixes.
    #[serde(default)]
    pub(crate) framed: bool,

    /// Passed to the encoder as an exact ratio, so `"29.97"` becomes `2997/100`.
    #[serde(default = "default_frame_rate")]
    pub(crate) frame_rate: String,

    /// The ffmpeg filter graph applied before writing to the output device.
    #[serde(default = "default_filter")]
    pub(crate) filter: String,

    /// The video loopback device ffmpeg writes to.
    #[serde(default = "default_output")]
    pub(crate) output: String,

    /// A complete encoder command to use instead of the default ffmpeg one.
    #[serde(default)]
    pub(crate) run: Vec<String>,

    /// Write frames to stdout instead of starting an encoder.
    #[serde(default)]
    pub(crate) passthrough: bool,

    /// Quiet the encoder down to just errors, and skip the progress display.
    #[serde(default)]
    pub(crate) quiet: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            source: Vec::new(),
            framed: false,
            frame_rate: default_frame_rate(),
            filter: default_filter(),
            output: default_output(),
            run: Vec::new(),
            passthrough: false,
            quiet: false,
        }
    }
}
