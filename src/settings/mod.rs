// SPDX-License-Identifier: GPL-3.0-or-later
use std::fs;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use tracing::debug;

mod cli;

use crate::camera::CameraSettings;
use crate::colormap::RenderSettings;
use crate::output::StreamSettings;
use crate::relay::RelaySettings;
pub(crate) use cli::{Args, Command};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Settings {
    /// Camera-specific settings.
    #[serde(default)]
    pub(crate) camera: CameraSettings,

    /// How temperatures are mapped to colors.
    #[serde(default)]
    pub(crate) render: RenderSettings,

    /// The format of the frame stream written by `capture`.
    #[serde(default)]
    pub(crate) stream: StreamSettings,

    /// Where `relay` gets frames from and sends them to.
    #[serde(default)]
    pub(crate) relay: RelaySettings,
}

impl Settings {
    pub(crate) fn from_path(path: &Path) -> anyhow::Result<Self> {
        let config_data = fs::read_to_string(path)
            .with_context(|| format!("Unable to read configuration file {}", path.display()))?;
        toml::from_str(&config_data)
            .with_context(|| format!("Unable to parse configuration file {}", path.display()))
    }

    /// Read the configuration file (if one was given) then apply the command line overrides.
    pub(crate) fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut settings = match &args.config_path {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration");
                Self::from_path(path)?
            }
            None => Self::default(),
        };
        args.command
            .apply(&mut settings)
            .context("Invalid command line option")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::path::PathBuf;

    use structopt::StructOpt;

    use super::{Args, Settings};
    use crate::camera::{Bus, CameraSettings};
    use crate::temperature::Temperature;

    const CONFIG: &str = r#"
        [camera]
        kind = "mlx90640"
        bus = 0
        frame_rate = 4
        flip_vertical = true

        [render]
        heatmap = "enby"
        temp_skew = 1.0
        min_temperature = { fahrenheit = 68 }
        max_temperature = 40

        [stream]
        headerless = true

        [relay]
        framed = true
        output = "/dev/video4"
    "#;

    #[test]
    fn empty_config() {
        let parsed: Settings = toml::from_str("").unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn full_config() {
        let parsed: Settings = toml::from_str(CONFIG).unwrap();
        match &parsed.camera {
            CameraSettings::Mlx90640 { bus, .. } => assert_eq!(bus, &Bus::Number(0)),
            other => panic!("Expected an MLX90640, got {:?}", other),
        }
        assert_eq!(parsed.camera.frame_rate(), 4.0);
        assert!(parsed.camera.common().flip_vertical);
        assert_eq!(parsed.render.heatmap, "enby");
        assert_eq!(parsed.render.min_temperature, Temperature::Fahrenheit(68.0));
        assert_eq!(parsed.render.max_temperature, Temperature::Celsius(40.0));
        assert!(parsed.stream.headerless);
        assert!(parsed.relay.framed);
        assert_eq!(parsed.relay.output, "/dev/video4");
    }

    #[test]
    fn unknown_table() {
        let parsed: Result<Settings, _> = toml::from_str("[network]\nhost = \"localhost\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn file_then_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap();
        let args = Args::from_iter_safe(
            ["thermopipe", "-c", path, "capture", "--heatmap", "grayscale"]
                .iter()
                .copied(),
        )
        .unwrap();
        let settings = Settings::from_args(&args).unwrap();
        assert_eq!(settings.render.heatmap, "grayscale");
        assert_eq!(settings.render.temp_skew, 1.0);
        assert!(settings.stream.headerless);
    }

    #[test]
    fn missing_file() {
        let err = Settings::from_path(&PathBuf::from("/nonexistent/thermopipe.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/thermopipe.toml"));
    }
}
