// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Deserialize;

/// Settings for the frame stream written by `capture`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct StreamSettings {
    /// Skip the stream header and the per-frame length prefixes.
    #[serde(default)]
    pub(crate) headerless: bool,

    /// How many frames between status log messages. 0 disables them.
    #[serde(default = "StreamSettings::default_status_interval")]
    pub(crate) status_interval: u64,

    /// Don't log status messages.
    #[serde(default)]
    pub(crate) quiet: bool,
}

impl StreamSettings {
    fn default_status_interval() -> u64 {
        10
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            headerless: false,
            status_interval: Self::default_status_interval(),
            quiet: false,
        }
    }
}

#[cfg(test)]
mod stream_test {
    use super::StreamSettings;

    #[test]
    fn defaults() {
        let parsed: Result<StreamSettings, _> = toml::from_str("");
        assert!(
            parsed.is_ok(),
            "Failed to parse empty TOML: {}",
            parsed.unwrap_err()
        );
        assert_eq!(parsed.unwrap(), StreamSettings::default());
    }

    #[test]
    fn headerless() {
        let parsed: StreamSettings =
            toml::from_str("headerless = true\nstatus_interval = 32").unwrap();
        let expected = StreamSettings {
            headerless: true,
            status_interval: 32,
            ..StreamSettings::default()
        };
        assert_eq!(parsed, expected);
    }
}
