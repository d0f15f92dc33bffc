// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::BTreeMap;
use std::convert::TryFrom;

use anyhow::anyhow;

use super::settings::RelaySettings;

/// ASCII escape, the start of every ANSI control sequence.
const ESCAPE: char = '\u{1b}';

/// Convert a decimal frame rate (like `"29.97"`) into an exact, reduced ratio (`"2997/100"`).
pub(crate) fn fractional_frame_rate(rate: &str) -> anyhow::Result<String> {
    let invalid = || anyhow!("Invalid frame rate \"{}\"", rate);
    let rate = rate.trim();
    let (whole, fraction) = match rate.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (rate, ""),
    };
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid());
    }
    let denominator = u32::try_from(fraction.len())
        .ok()
        .and_then(|digits| 10u64.checked_pow(digits))
        .ok_or_else(invalid)?;
    let digits = format!("{}{}", whole, fraction);
    let numerator: u64 = if digits.is_empty() {
        0
    } else {
        digits.parse().map_err(|_| invalid())?
    };
    if numerator == 0 {
        return Err(invalid());
    }
    let divisor = num::integer::gcd(numerator, denominator);
    Ok(format!("{}/{}", numerator / divisor, denominator / divisor))
}

/// Split an ffmpeg progress line into its key/value pairs.
///
/// Progress lines look like
/// `frame=17703 fps=478 q=-0.0 size=   30184kB time=00:09:50.62 bitrate= 418.7kbits/s speed=15.9x`.
/// Anything that doesn't follow that shape, or doesn't include a `frame` entry, gives `None`.
pub(crate) fn parse_ffmpeg_progress(line: &str) -> Option<BTreeMap<String, String>> {
    let fragments: Vec<&str> = line.split('=').map(str::trim).collect();
    if fragments.len() < 2 {
        return None;
    }
    let last = fragments.len() - 1;
    let mut pairs = BTreeMap::new();
    let mut key = fragments[0];
    for fragment in &fragments[1..last] {
        // Each middle fragment is the previous key's value and the next key.
        let mut parts = fragment.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(value), Some(next_key), None) => {
                pairs.insert(key.to_string(), value.to_string());
                key = next_key;
            }
            _ => return None,
        }
    }
    pairs.insert(key.to_string(), fragments[last].to_string());
    if pairs.contains_key("frame") {
        Some(pairs)
    } else {
        None
    }
}

/// Remove ANSI escape sequences (colors, cursor movement) from a line.
pub(crate) fn strip_ansi(line: &str) -> String {
    let mut stripped = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            stripped.push(c);
            continue;
        }
        match chars.next() {
            // Control sequence: parameters and intermediates, then a final byte in '@'..='~'.
            Some('[') => {
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            // Operating system command, terminated by BEL or ST (ESC \).
            Some(']') => {
                while let Some(c) = chars.next() {
                    if c == '\u{7}' {
                        break;
                    }
                    if c == ESCAPE && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            // Two character sequences (and a lone trailing escape).
            _ => (),
        }
    }
    stripped
}

/// Something worth telling the user, pulled out of the encoder's stderr.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum EncoderEvent {
    /// Shown once, just before the first progress line.
    Hint(String),

    /// Periodic encoder progress.
    Progress { frame: String, fps: Option<String> },

    /// Any other line.
    Message(String),
}

/// Splits the encoder's stderr into lines and classifies them.
///
/// ffmpeg redraws its progress line with carriage returns, so both `\r` and `\n` end a line.
/// Partial lines are held until the rest arrives.
#[derive(Debug, Default)]
pub(crate) struct ProgressHandler {
    buffer: Vec<u8>,
    hint: Option<String>,
}

impl ProgressHandler {
    pub(crate) fn new(hint: Option<String>) -> Self {
        Self {
            buffer: Vec::new(),
            hint,
        }
    }

    pub(crate) fn feed(&mut self, data: &[u8]) -> Vec<EncoderEvent> {
        self.buffer.extend_from_slice(data);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\r' || *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = strip_ansi(String::from_utf8_lossy(&line[..end]).trim_end());
            if line.is_empty() {
                continue;
            }
            self.classify(line, &mut events);
        }
        events
    }

    /// Flush out any partial line left once the encoder has closed stderr.
    pub(crate) fn finish(&mut self) -> Vec<EncoderEvent> {
        let mut events = Vec::new();
        let remaining = std::mem::take(&mut self.buffer);
        let line = strip_ansi(String::from_utf8_lossy(&remaining).trim_end());
        if !line.is_empty() {
            self.classify(line, &mut events);
        }
        events
    }

    fn classify(&mut self, line: String, events: &mut Vec<EncoderEvent>) {
        match parse_ffmpeg_progress(&line) {
            Some(mut progress) => {
                if let Some(hint) = self.hint.take() {
                    events.push(EncoderEvent::Hint(hint));
                }
                // `frame` is always present in a parsed progress line.
                let frame = progress.remove("frame").unwrap_or_default();
                let fps = progress.remove("fps");
                events.push(EncoderEvent::Progress { frame, fps });
            }
            None => events.push(EncoderEvent::Message(line)),
        }
    }
}

/// A command to view the loopback device, shown to the user once frames are flowing.
pub(crate) fn viewing_hint(output: &str) -> String {
    format!(
        "gst-launch-1.0 v4l2src device={} ! videoconvert ! autovideosink sync=false",
        output
    )
}

/// The encoder command line: the user's `run` command if given, otherwise ffmpeg writing to the
/// loopback device.
pub(crate) fn encoder_command(settings: &RelaySettings) -> anyhow::Result<Vec<String>> {
    if !settings.run.is_empty() {
        return Ok(settings.run.clone());
    }
    let rate = fractional_frame_rate(&settings.frame_rate)?;
    let mut args: Vec<String> = vec!["ffmpeg".into()];
    if settings.quiet {
        args.extend(vec!["-loglevel".into(), "error".into()]);
    }
    args.extend(
        vec![
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s:v",
            "32x24",
            "-r",
            &rate,
            "-i",
            "-",
            "-vf",
            &settings.filter,
            "-f",
            "v4l2",
            &settings.output,
        ]
        .into_iter()
        .map(String::from),
    );
    Ok(args)
}
