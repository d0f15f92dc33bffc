// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::error::Error;
use crate::frame::{PixelFrame, FRAME_HEIGHT, FRAME_WIDTH};

/// Bytes per pixel in an RGB24 frame.
const BYTES_PER_PIXEL: u32 = 3;

/// Mode strings longer than this are taken as a sign of a garbled stream.
const MAX_MODE_LENGTH: u32 = 64;

/// The pixel format carried by a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StreamMode {
    /// Packed 8-bit RGB, row-major, with no padding.
    Raw,
}

impl StreamMode {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "RAW",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RAW" => Ok(Self::Raw),
            _ => Err(Error::InvalidStream(format!("unsupported mode \"{}\"", s))),
        }
    }
}

/// The header sent once, at the start of a framed stream.
///
/// On the wire this is the width, height, and mode string length as big-endian `u32`s, followed
/// by the mode string itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StreamHeader {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) mode: StreamMode,
}

impl Default for StreamHeader {
    fn default() -> Self {
        Self {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            mode: StreamMode::Raw,
        }
    }
}

impl StreamHeader {
    /// The size of each frame's payload, in bytes.
    pub(crate) fn frame_len(&self) -> usize {
        (self.width * self.height * BYTES_PER_PIXEL) as usize
    }

    pub(crate) fn to_bytes(&self) -> Bytes {
        let mode = self.mode.as_str().as_bytes();
        let mut buf = BytesMut::with_capacity(12 + mode.len());
        buf.put_u32(self.width);
        buf.put_u32(self.height);
        buf.put_u32(mode.len() as u32);
        buf.put_slice(mode);
        buf.freeze()
    }
}

/// Writes colorized frames to a byte sink, optionally with the header and length prefixes.
#[derive(Debug)]
pub(crate) struct RawStreamWriter<W> {
    writer: W,
    headerless: bool,
    header_sent: bool,
}

impl<W: Write> RawStreamWriter<W> {
    pub(crate) fn new(writer: W, headerless: bool) -> Self {
        Self {
            writer,
            headerless,
            header_sent: false,
        }
    }

    /// Write a single frame, sending the stream header first if this is the first frame.
    ///
    /// Each frame is flushed so downstream readers see it immediately.
    pub(crate) fn write_frame(&mut self, frame: &PixelFrame) -> io::Result<()> {
        let payload = frame.as_bytes();
        if !self.headerless {
            if !self.header_sent {
                let header = StreamHeader::default();
                debug!(?header, "writing stream header");
                self.writer.write_all(&header.to_bytes())?;
                self.header_sent = true;
            }
            self.writer.write_all(&(payload.len() as u32).to_be_bytes())?;
        }
        self.writer.write_all(payload)?;
        self.writer.flush()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.writer
    }
}

/// Fill `buf` completely, or return `false` if the reader was already at EOF.
///
/// EOF partway through `buf` is an error.
async fn read_exact_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let count = reader.read(&mut buf[filled..]).await?;
        if count == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        filled += count;
    }
    Ok(true)
}

/// Decodes a framed stream, yielding just the frame payloads.
#[derive(Debug)]
pub(crate) struct RawStreamReader<R> {
    reader: R,
    header: StreamHeader,
}

impl<R> RawStreamReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Read and validate the stream header.
    pub(crate) async fn new(mut reader: R) -> anyhow::Result<Self> {
        let width = reader.read_u32().await?;
        let height = reader.read_u32().await?;
        let mode_len = reader.read_u32().await?;
        if mode_len > MAX_MODE_LENGTH {
            return Err(Error::InvalidStream(format!(
                "mode string length {} is too long",
                mode_len
            ))
            .into());
        }
        let mut mode = vec![0u8; mode_len as usize];
        reader.read_exact(&mut mode).await?;
        let mode: StreamMode = String::from_utf8_lossy(&mode).parse()?;
        if width == 0 || height == 0 {
            return Err(Error::InvalidStream(format!(
                "invalid frame dimensions {}x{}",
                width, height
            ))
            .into());
        }
        let header = StreamHeader {
            width,
            height,
            mode,
        };
        debug!(?header, "read stream header");
        Ok(Self { reader, header })
    }

    pub(crate) fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Read the next frame's payload, or `None` if the stream ended cleanly between frames.
    pub(crate) async fn next_frame(&mut self) -> anyhow::Result<Option<Bytes>> {
        let mut length = [0u8; 4];
        if !read_exact_or_eof(&mut self.reader, &mut length).await? {
            return Ok(None);
        }
        let length = u32::from_be_bytes(length) as usize;
        let expected = self.header.frame_len();
        if length != expected {
            return Err(Error::InvalidStream(format!(
                "frame length {} does not match {}x{} RGB24 ({} bytes)",
                length, self.header.width, self.header.height, expected
            ))
            .into());
        }
        let mut payload = BytesMut::with_capacity(length);
        payload.resize(length, 0);
        self.reader.read_exact(&mut payload).await?;
        trace!(length, "read frame");
        Ok(Some(payload.freeze()))
    }
}
