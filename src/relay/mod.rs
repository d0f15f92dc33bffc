// SPDX-License-Identifier: GPL-3.0-or-later
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{anyhow, Context as _};
use futures::future::{Future, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, info_span, warn};
use tracing_futures::Instrument;

use crate::output::{RawStreamReader, StreamHeader};

mod ffmpeg;
mod settings;

use ffmpeg::{encoder_command, viewing_hint, EncoderEvent, ProgressHandler};
pub(crate) use settings::RelaySettings;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type InnerTask = Pin<Box<dyn Future<Output = anyhow::Result<Finished>> + Send>>;
type TaskList = FuturesUnordered<InnerTask>;

/// Which relay task completed.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Finished {
    Pump,
    Encoder,
}

fn spawn_command(argv: &[String], role: &str) -> anyhow::Result<Command> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("The {} command is empty", role))?;
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    Ok(command)
}

/// Copy frame data from `source` to `sink`.
///
/// Headerless streams are copied as-is. Framed streams are decoded, and only the frame payloads
/// are written to `sink`. The sink going away (the encoder exiting) is not an error.
pub(crate) async fn pump<R, W>(mut source: R, mut sink: W, framed: bool) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = if framed {
        pump_framed(source, &mut sink).await
    } else {
        tokio::io::copy(&mut source, &mut sink)
            .await
            .map(|bytes| debug!(bytes, "source closed"))
            .map_err(anyhow::Error::from)
    };
    match result {
        Err(err) if is_broken_pipe(&err) => {
            info!("Frame sink closed, stopping relay");
            Ok(())
        }
        Err(err) => Err(err),
        Ok(()) => match sink.shutdown().await {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other.context("Unable to close frame sink"),
        },
    }
}

async fn pump_framed<R, W>(source: R, sink: &mut W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = RawStreamReader::new(source)
        .await
        .context("Unable to read stream header")?;
    let header = *reader.header();
    let expected = StreamHeader::default();
    if header.width != expected.width || header.height != expected.height {
        warn!(
            width = header.width,
            height = header.height,
            "Stream dimensions differ from {}x{}, the encoder may misread frames",
            expected.width,
            expected.height
        );
    }
    let mut frames = 0u64;
    while let Some(payload) = reader.next_frame().await? {
        sink.write_all(&payload).await?;
        frames += 1;
    }
    debug!(frames, "source closed");
    Ok(())
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .map_or(false, |io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
    })
}

fn report(event: EncoderEvent) {
    match event {
        EncoderEvent::Hint(hint) => info!("Frames are flowing, view them with: {}", hint),
        EncoderEvent::Progress { frame, fps } => {
            eprint!(
                "\rframe {:>8}  fps {:>6}",
                frame,
                fps.as_deref().unwrap_or("-")
            );
        }
        EncoderEvent::Message(message) => info!(target: "encoder", "{}", message),
    }
}

/// Read the encoder's stderr until it closes, reporting progress as it goes.
async fn watch_encoder<R>(mut stderr: R, mut handler: ProgressHandler) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1024];
    let mut showed_progress = false;
    loop {
        let count = stderr.read(&mut buf).await?;
        let events = if count == 0 {
            handler.finish()
        } else {
            handler.feed(&buf[..count])
        };
        for event in events {
            showed_progress |= matches!(event, EncoderEvent::Progress { .. });
            report(event);
        }
        if count == 0 {
            break;
        }
    }
    if showed_progress {
        eprintln!();
    }
    Ok(())
}

async fn wait_for_encoder(
    mut child: Child,
    watcher: Option<impl Future<Output = anyhow::Result<()>>>,
) -> anyhow::Result<Finished> {
    let status = match watcher {
        Some(watcher) => {
            let (status, watched) = futures::join!(child.wait(), watcher);
            watched.context("Unable to read encoder output")?;
            status
        }
        None => child.wait().await,
    }
    .context("Unable to wait for the encoder")?;
    if status.success() {
        info!("Encoder finished");
        Ok(Finished::Encoder)
    } else {
        Err(anyhow!("Encoder exited with {}", status))
    }
}

/// Start the source, returning its stdout and the child process (if there is one).
fn open_source(settings: &RelaySettings) -> anyhow::Result<(BoxedReader, Option<Child>)> {
    if settings.source.is_empty() {
        debug!("reading frames from stdin");
        return Ok((Box::new(tokio::io::stdin()), None));
    }
    info!(command = ?settings.source, "starting source");
    let mut child = spawn_command(&settings.source, "source")?
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .context("Unable to start the source command")?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("The source command has no stdout"))?;
    Ok((Box::new(stdout), Some(child)))
}

/// Relay a frame stream from the source into the encoder (or stdout).
///
/// Runs until the encoder exits, the source ends and the encoder finishes with what it was sent,
/// or something fails.
pub(crate) async fn relay(settings: &RelaySettings) -> anyhow::Result<()> {
    let (source, source_child) = open_source(settings)?;
    let tasks: TaskList = FuturesUnordered::new();
    let sink: BoxedWriter = if settings.passthrough {
        debug!("passing frames through to stdout");
        Box::new(tokio::io::stdout())
    } else {
        let argv = encoder_command(settings)?;
        info!(command = ?argv, "starting encoder");
        let pipe_stderr = !settings.quiet;
        let mut command = spawn_command(&argv, "encoder")?;
        command.stdin(Stdio::piped());
        if pipe_stderr {
            command.stderr(Stdio::piped());
        }
        let mut child = command.spawn().context("Unable to start the encoder")?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("The encoder has no stdin"))?;
        let hint = if settings.run.is_empty() {
            Some(viewing_hint(&settings.output))
        } else {
            None
        };
        let watcher = child
            .stderr
            .take()
            .map(|stderr| watch_encoder(stderr, ProgressHandler::new(hint)));
        tasks.push(
            wait_for_encoder(child, watcher)
                .instrument(info_span!("encoder"))
                .boxed(),
        );
        Box::new(stdin)
    };
    let framed = settings.framed;
    let pump_task = async move {
        pump(source, sink, framed).await?;
        if let Some(mut child) = source_child {
            let status = child
                .wait()
                .await
                .context("Unable to wait for the source command")?;
            if !status.success() {
                warn!(%status, "Source command failed");
            }
        }
        Ok::<_, anyhow::Error>(Finished::Pump)
    };
    tasks.push(pump_task.instrument(info_span!("pump")).boxed());
    run_tasks(tasks).await
}

async fn run_tasks(mut tasks: TaskList) -> anyhow::Result<()> {
    while let Some(finished) = tasks.next().await {
        match finished? {
            Finished::Encoder => break,
            Finished::Pump => debug!("source drained, waiting for the encoder"),
        }
    }
    Ok(())
}
