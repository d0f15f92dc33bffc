// SPDX-License-Identifier: GPL-3.0-or-later
use std::error::Error as StdError;
use std::fmt;

/// Errors raised by the colorizing core when it is handed something it cannot work with.
///
/// None of these are retried; they all indicate a bad configuration or a caller passing data of
/// the wrong shape.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Error {
    /// The named heatmap is neither builtin, user-defined, nor a `colorous` gradient.
    UnknownHeatmap(String),

    /// A heatmap definition that breaks one of the control point rules.
    InvalidHeatmap(String),

    /// A colormap table needs at least one entry.
    InvalidResolution(usize),

    /// The auto-ranging skew rate must be a finite, non-negative number.
    InvalidSkew(f32),

    /// A command line that can't be split into arguments, usually from unbalanced quotes.
    InvalidCommand(String),

    /// A frame with the wrong number of readings (or the wrong dimensions).
    FrameSize { expected: usize, actual: usize },

    /// A framed stream that doesn't follow the header/length-prefix format.
    InvalidStream(String),
}

impl Error {
    /// Whether this error is one of the configuration errors (as opposed to bad frame data).
    pub(crate) fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownHeatmap(_)
                | Self::InvalidHeatmap(_)
                | Self::InvalidResolution(_)
                | Self::InvalidSkew(_)
                | Self::InvalidCommand(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownHeatmap(name) => write!(f, "unknown heatmap \"{}\"", name),
            Self::InvalidHeatmap(reason) => write!(f, "invalid heatmap: {}", reason),
            Self::InvalidResolution(resolution) => write!(
                f,
                "colormap resolution must be positive (given {})",
                resolution
            ),
            Self::InvalidSkew(skew) => write!(
                f,
                "temperature skew must be finite and non-negative (given {})",
                skew
            ),
            Self::InvalidCommand(command) => write!(f, "unable to split command \"{}\"", command),
            Self::FrameSize { expected, actual } => write!(
                f,
                "expected a frame of {} readings, got {}",
                expected, actual
            ),
            Self::InvalidStream(reason) => write!(f, "invalid frame stream: {}", reason),
        }
    }
}

impl StdError for Error {}
