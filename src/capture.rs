// SPDX-License-Identifier: GPL-3.0-or-later
use std::io::{self, Write};
use std::time::Instant;

use anyhow::Context as _;
use tracing::{debug, info, warn};

use crate::colormap::{render, ColormapTable, TemperatureRangeTracker};
use crate::frame::TemperatureFrame;
use crate::output::RawStreamWriter;
use crate::temperature::{Temperature, TemperatureUnit};

/// Knobs for a single run of [`capture_loop`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct CaptureOptions {
    /// Stop after this many frames have been written.
    pub(crate) frame_limit: Option<u64>,

    /// Frames between status messages; 0 disables them.
    pub(crate) status_interval: u64,

    /// Largest per-frame range adjustment.
    pub(crate) max_skew: f32,

    /// The unit used in status messages.
    pub(crate) unit: TemperatureUnit,
}

/// Colorize frames from `frames` and write them to `writer` until the frames run out, the frame
/// limit is hit, or the reader on the other end goes away.
///
/// Returns the number of frames written.
pub(crate) fn capture_loop<I, W>(
    frames: I,
    table: &ColormapTable,
    tracker: &mut TemperatureRangeTracker,
    writer: &mut RawStreamWriter<W>,
    options: CaptureOptions,
) -> anyhow::Result<u64>
where
    I: IntoIterator<Item = anyhow::Result<TemperatureFrame>>,
    W: Write,
{
    let mut count = 0u64;
    let mut status_start = Instant::now();
    if options.frame_limit == Some(0) {
        return Ok(count);
    }
    for frame in frames {
        let frame = frame.context("Unable to read a frame from the camera")?;
        let range = tracker.observe(&frame, options.max_skew);
        let pixels = render(&frame, table, range.low, range.high);
        match writer.write_frame(&pixels) {
            Ok(_) => (),
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                info!(frames = count, "Output closed, stopping capture");
                return Ok(count);
            }
            Err(err) => return Err(err).context("Unable to write frame"),
        }
        count += 1;
        if options.status_interval > 0 && count % options.status_interval == 0 {
            let elapsed = status_start.elapsed().as_secs_f32();
            let fps = if elapsed > 0.0 {
                options.status_interval as f32 / elapsed
            } else {
                0.0
            };
            info!(
                frames = count,
                fps = %format!("{:.2}", fps),
                low = %format!("{:.2}", Temperature::Celsius(range.low).to_unit(options.unit)),
                high = %format!("{:.2}", Temperature::Celsius(range.high).to_unit(options.unit)),
                "capture status"
            );
            status_start = Instant::now();
        }
        if options.frame_limit.map_or(false, |limit| count >= limit) {
            debug!(frames = count, "frame limit reached");
            break;
        }
    }
    Ok(count)
}

/// Write a frame as plain text, one row of the sensor per line.
pub(crate) fn dump_frame<W: Write>(
    frame: &TemperatureFrame,
    unit: TemperatureUnit,
    out: &mut W,
) -> io::Result<()> {
    for row in frame.rows() {
        let line = row
            .iter()
            .map(|celsius| format!("{:5.2}", Temperature::Celsius(*celsius).in_unit(unit)))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

/// Pull a single frame and dump it.
pub(crate) fn dump<I, W>(frames: I, unit: TemperatureUnit, out: &mut W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = anyhow::Result<TemperatureFrame>>,
    W: Write,
{
    match frames.into_iter().next() {
        Some(frame) => {
            let frame = frame.context("Unable to read a frame from the camera")?;
            dump_frame(&frame, unit, out).context("Unable to write temperatures")
        }
        None => {
            warn!("The camera did not produce any frames");
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, Write};

    use anyhow::anyhow;

    use super::{capture_loop, dump, dump_frame, CaptureOptions};
    use crate::camera::{FrameSource, RetryPolicy, ScriptedCamera};
    use crate::colormap::{ColormapTable, HeatmapRegistry, TemperatureRangeTracker};
    use crate::frame::{TemperatureFrame, FRAME_PIXELS, FRAME_WIDTH};
    use crate::output::RawStreamWriter;
    use crate::temperature::TemperatureUnit;

    const PAYLOAD_LEN: usize = FRAME_PIXELS * 3;

    fn grayscale() -> ColormapTable {
        let heatmap = HeatmapRegistry::builtin().get("grayscale").unwrap();
        ColormapTable::build(&heatmap, 1000).unwrap()
    }

    fn frames(temperatures: &[f32]) -> Vec<anyhow::Result<TemperatureFrame>> {
        temperatures
            .iter()
            .map(|t| Ok(TemperatureFrame::from_vec(vec![*t; FRAME_PIXELS]).unwrap()))
            .collect()
    }

    /// A sink that accepts a fixed number of writes, then acts like a closed pipe.
    struct ClosingPipe {
        writes_left: usize,
        written: Vec<u8>,
    }

    impl Write for ClosingPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.writes_left == 0 {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            self.writes_left -= 1;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_every_frame() {
        let table = grayscale();
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let mut writer = RawStreamWriter::new(Vec::new(), true);
        let count = capture_loop(
            frames(&[25.0, 45.0, 35.0]),
            &table,
            &mut tracker,
            &mut writer,
            CaptureOptions::default(),
        )
        .unwrap();
        assert_eq!(count, 3);
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 3 * PAYLOAD_LEN);
        assert_eq!(&bytes[..3], &[34, 34, 34]);
        assert_eq!(&bytes[PAYLOAD_LEN..PAYLOAD_LEN + 3], &[254, 254, 254]);
        assert_eq!(&bytes[2 * PAYLOAD_LEN..2 * PAYLOAD_LEN + 3], &[154, 154, 154]);
    }

    #[test]
    fn frame_limit() {
        let table = grayscale();
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let mut writer = RawStreamWriter::new(Vec::new(), false);
        let options = CaptureOptions {
            frame_limit: Some(2),
            status_interval: 1,
            ..CaptureOptions::default()
        };
        let count = capture_loop(
            frames(&[30.0, 31.0, 32.0, 33.0]),
            &table,
            &mut tracker,
            &mut writer,
            options,
        )
        .unwrap();
        assert_eq!(count, 2);
        assert_eq!(writer.into_inner().len(), 15 + 2 * (4 + PAYLOAD_LEN));
    }

    #[test]
    fn auto_ranging_applies_after_first_frame() {
        let table = grayscale();
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let mut writer = RawStreamWriter::new(Vec::new(), true);
        let options = CaptureOptions {
            max_skew: 1.0,
            ..CaptureOptions::default()
        };
        capture_loop(frames(&[50.0, 50.0]), &table, &mut tracker, &mut writer, options).unwrap();
        let range = tracker.range();
        assert_eq!(range.low, 25.0 + 0.1);
        assert_eq!(range.high, 45.0 + 0.1);
    }

    #[test]
    fn broken_pipe_is_quiet() {
        let table = grayscale();
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let pipe = ClosingPipe {
            writes_left: 2,
            written: Vec::new(),
        };
        let mut writer = RawStreamWriter::new(pipe, true);
        let count = capture_loop(
            frames(&[30.0, 31.0, 32.0, 33.0]),
            &table,
            &mut tracker,
            &mut writer,
            CaptureOptions::default(),
        )
        .unwrap();
        assert_eq!(count, 2);
        assert_eq!(writer.into_inner().written.len(), 2 * PAYLOAD_LEN);
    }

    #[test]
    fn camera_errors_propagate() {
        let table = grayscale();
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let mut writer = RawStreamWriter::new(Vec::new(), true);
        let mut input = frames(&[30.0]);
        input.push(Err(anyhow!("camera unplugged")));
        let result = capture_loop(input, &table, &mut tracker, &mut writer, CaptureOptions::default());
        assert!(result.is_err());
        assert_eq!(writer.into_inner().len(), PAYLOAD_LEN);
    }

    #[test]
    fn from_frame_source() {
        let source = FrameSource::new(
            Box::new(ScriptedCamera::frames(&[10.0, 20.0, 30.0])),
            RetryPolicy::default(),
        )
        .with_warmup(1);
        let table = grayscale();
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let mut writer = RawStreamWriter::new(Vec::new(), true);
        let count = capture_loop(
            source,
            &table,
            &mut tracker,
            &mut writer,
            CaptureOptions::default(),
        )
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn dump_format() {
        let readings: Vec<f32> = (0..FRAME_PIXELS).map(|n| 20.0 + n as f32 / 100.0).collect();
        let frame = TemperatureFrame::from_vec(readings).unwrap();
        let mut out = Vec::new();
        dump_frame(&frame, TemperatureUnit::Celsius, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 24);
        let first: Vec<&str> = lines[0].split(' ').collect();
        assert_eq!(first.len(), FRAME_WIDTH as usize);
        assert_eq!(first[0], "20.00");
        assert_eq!(first[1], "20.01");
        assert!(lines[23].ends_with("27.67"));
    }

    #[test]
    fn dump_fahrenheit() {
        let mut out = Vec::new();
        dump(frames(&[100.0]), TemperatureUnit::Fahrenheit, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("212.00 212.00"));
    }

    #[test]
    fn dump_pads_small_values() {
        let mut out = Vec::new();
        dump(frames(&[-1.5]), TemperatureUnit::Celsius, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("-1.50 -1.50"));
        let mut out = Vec::new();
        dump(frames(&[1.5]), TemperatureUnit::Celsius, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with(" 1.50  1.50"));
    }
}
