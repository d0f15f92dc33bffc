// SPDX-License-Identifier: GPL-3.0-or-later
use std::io;
use std::process;

use anyhow::Context as _;
use futures::future::FutureExt;
use structopt::StructOpt;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod camera;
mod capture;
mod colormap;
mod error;
mod frame;
mod output;
mod relay;
mod settings;
mod temperature;
mod util;

use crate::capture::CaptureOptions;
use crate::output::RawStreamWriter;
use crate::settings::{Args, Command, Settings};
use crate::util::flatten_join_result;

/// Exit status for configuration mistakes, as opposed to runtime failures.
const CONFIGURATION_EXIT_CODE: i32 = 2;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn capture(settings: Settings, frame_limit: Option<u64>) -> anyhow::Result<()> {
    // Build the colormap before touching the camera so configuration errors show up first.
    let table = settings.render.build_table()?;
    let mut tracker = settings.render.tracker();
    let options = CaptureOptions {
        frame_limit,
        status_interval: if settings.stream.quiet {
            0
        } else {
            settings.stream.status_interval
        },
        max_skew: settings.render.temp_skew,
        unit: settings.render.units,
    };
    info!(
        heatmap = %settings.render.heatmap,
        low = %settings.render.min_temperature,
        high = %settings.render.max_temperature,
        skew = settings.render.temp_skew,
        "starting capture"
    );
    let headerless = settings.stream.headerless;
    let count = spawn_blocking(move || {
        let source = settings
            .camera
            .frame_source()
            .context("Unable to set up the camera")?;
        let stdout = io::stdout();
        let mut writer = RawStreamWriter::new(stdout.lock(), headerless);
        capture::capture_loop(source, &table, &mut tracker, &mut writer, options)
    })
    .map(flatten_join_result)
    .await?;
    info!(frames = count, "capture finished");
    Ok(())
}

async fn dump(settings: Settings) -> anyhow::Result<()> {
    let unit = settings.render.units;
    spawn_blocking(move || {
        let source = settings
            .camera
            .frame_source()
            .context("Unable to set up the camera")?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        capture::dump(source, unit, &mut out)
    })
    .map(flatten_join_result)
    .await
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = Settings::from_args(&args)?;
    debug!(?settings, "loaded settings");
    match args.command {
        Command::Capture { frames, .. } => capture(settings, frames).await,
        Command::Dump { .. } => dump(settings).await,
        Command::Relay(_) => relay::relay(&settings.relay).await,
    }
}

fn is_configuration_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<error::Error>()
            .map_or(false, error::Error::is_configuration)
    })
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = Args::from_args();
    if let Err(err) = run(args).await {
        error!("{:#}", err);
        let code = if is_configuration_error(&err) {
            CONFIGURATION_EXIT_CODE
        } else {
            1
        };
        process::exit(code);
    }
}
