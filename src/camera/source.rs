// SPDX-License-Identifier: GPL-3.0-or-later
use std::thread::sleep as thread_sleep;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::frame::TemperatureFrame;

use super::thermal_camera::{Reading, ThermalCamera};

/// The longest a single retry will wait.
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// How many times, and how patiently, failed camera reads are retried.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RetryPolicy {
    /// Consecutive failed reads that are retried before giving up.
    pub(crate) max_retries: u32,

    /// The wait after the first failure; every later wait doubles, up to one second.
    pub(crate) initial_backoff: Duration,
}

impl RetryPolicy {
    /// The wait before retrying after `attempt` consecutive failures (starting at 1).
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

/// Pulls complete, correctly oriented frames out of a camera.
///
/// Waits while the camera is not ready, retries transient read errors, and throws away the
/// warm-up frames.
pub(crate) struct FrameSource {
    camera: Box<dyn ThermalCamera + Send>,
    policy: RetryPolicy,
    poll_interval: Duration,
    warmup_remaining: u32,
    flip_horizontal: bool,
    flip_vertical: bool,
}

impl FrameSource {
    pub(crate) fn new(camera: Box<dyn ThermalCamera + Send>, policy: RetryPolicy) -> Self {
        Self {
            camera,
            policy,
            poll_interval: Duration::from_millis(10),
            warmup_remaining: 0,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }

    pub(crate) fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub(crate) fn with_warmup(mut self, warmup_frames: u32) -> Self {
        self.warmup_remaining = warmup_frames;
        self
    }

    pub(crate) fn with_flips(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    /// Block until the next frame is available.
    ///
    /// Returns `Ok(None)` once the camera has no more frames to give.
    pub(crate) fn next_frame(&mut self) -> anyhow::Result<Option<TemperatureFrame>> {
        let mut failures = 0u32;
        loop {
            match self.camera.thermal_image() {
                Ok(Reading::Frame(mut frame)) => {
                    failures = 0;
                    if self.warmup_remaining > 0 {
                        self.warmup_remaining -= 1;
                        debug!(remaining = self.warmup_remaining, "discarding warm-up frame");
                        continue;
                    }
                    if self.flip_horizontal {
                        frame.flip_horizontal();
                    }
                    if self.flip_vertical {
                        frame.flip_vertical();
                    }
                    return Ok(Some(frame));
                }
                Ok(Reading::NotReady) => {
                    trace!("Waiting {}us for the camera", self.poll_interval.as_micros());
                    thread_sleep(self.poll_interval);
                }
                Ok(Reading::Finished) => {
                    debug!("camera has no more frames");
                    return Ok(None);
                }
                Err(err) => {
                    failures += 1;
                    if failures > self.policy.max_retries {
                        return Err(err.context(format!(
                            "Camera read failed {} times in a row",
                            failures
                        )));
                    }
                    let backoff = self.policy.backoff(failures);
                    warn!(
                        attempt = failures,
                        backoff_ms = backoff.as_millis() as u64,
                        "Camera read failed, retrying: {:#}",
                        err
                    );
                    thread_sleep(backoff);
                }
            }
        }
    }
}

impl Iterator for FrameSource {
    type Item = anyhow::Result<TemperatureFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::VecDeque;
    use std::time::Duration;

    use anyhow::anyhow;

    use super::{FrameSource, RetryPolicy};
    use crate::camera::{Reading, ThermalCamera};
    use crate::frame::{TemperatureFrame, FRAME_PIXELS, FRAME_WIDTH};

    /// What a [`ScriptedCamera`] does on each call.
    #[derive(Clone, Debug)]
    pub(crate) enum Step {
        Frame(f32),
        NotReady,
        Fail,
    }

    /// A camera that plays back a fixed script, then reports it is finished.
    pub(crate) struct ScriptedCamera(pub(crate) VecDeque<Step>);

    impl ScriptedCamera {
        pub(crate) fn frames(temperatures: &[f32]) -> Self {
            Self(temperatures.iter().map(|t| Step::Frame(*t)).collect())
        }
    }

    impl ThermalCamera for ScriptedCamera {
        fn thermal_image(&mut self) -> anyhow::Result<Reading> {
            match self.0.pop_front() {
                Some(Step::Frame(t)) => Ok(Reading::Frame(
                    TemperatureFrame::from_vec(vec![t; FRAME_PIXELS]).unwrap(),
                )),
                Some(Step::NotReady) => Ok(Reading::NotReady),
                Some(Step::Fail) => Err(anyhow!("I2C bus hiccup")),
                None => Ok(Reading::Finished),
            }
        }

        fn set_frame_rate(&mut self, _frame_rate: f32) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn quick_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::ZERO,
        }
    }

    fn source(steps: Vec<Step>, max_retries: u32) -> FrameSource {
        FrameSource::new(
            Box::new(ScriptedCamera(steps.into_iter().collect())),
            quick_policy(max_retries),
        )
        .with_poll_interval(Duration::ZERO)
    }

    fn first_reading(frame: &TemperatureFrame) -> f32 {
        frame.readings()[0]
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(50));
        assert_eq!(policy.backoff(2), Duration::from_millis(100));
        assert_eq!(policy.backoff(4), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(800));
        assert_eq!(policy.backoff(6), Duration::from_secs(1));
        assert_eq!(policy.backoff(1000), Duration::from_secs(1));
    }

    #[test]
    fn waits_for_ready() {
        let mut source = source(
            vec![Step::NotReady, Step::NotReady, Step::Frame(20.0)],
            0,
        );
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(first_reading(&frame), 20.0);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn retries_transient_errors() {
        let mut source = source(
            vec![Step::Fail, Step::Fail, Step::Frame(21.0), Step::Fail, Step::Frame(22.0)],
            2,
        );
        let temps: Vec<f32> = source
            .by_ref()
            .map(|frame| first_reading(&frame.unwrap()))
            .collect();
        assert_eq!(temps, vec![21.0, 22.0]);
    }

    #[test]
    fn gives_up() {
        let mut source = source(vec![Step::Fail, Step::Fail, Step::Fail, Step::Frame(21.0)], 2);
        let err = source.next_frame().unwrap_err();
        assert!(format!("{:#}", err).contains("I2C bus hiccup"));
    }

    #[test]
    fn no_retries() {
        let mut source = source(vec![Step::Fail, Step::Frame(21.0)], 0);
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn warmup_discarded() {
        let mut source = source(
            vec![Step::Frame(1.0), Step::Frame(2.0), Step::Frame(3.0)],
            0,
        )
        .with_warmup(2);
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(first_reading(&frame), 3.0);
    }

    #[test]
    fn flips_applied() {
        let readings: Vec<f32> = (0..FRAME_PIXELS).map(|n| n as f32).collect();
        struct Once(Option<Vec<f32>>);
        impl ThermalCamera for Once {
            fn thermal_image(&mut self) -> anyhow::Result<Reading> {
                Ok(match self.0.take() {
                    Some(readings) => Reading::Frame(TemperatureFrame::from_vec(readings)?),
                    None => Reading::Finished,
                })
            }

            fn set_frame_rate(&mut self, _frame_rate: f32) -> anyhow::Result<()> {
                Ok(())
            }
        }
        let mut source = FrameSource::new(Box::new(Once(Some(readings))), quick_policy(0))
            .with_flips(true, true);
        let frame = source.next_frame().unwrap().unwrap();
        // Both flips together are a half turn.
        assert_eq!(frame.readings()[0], (FRAME_PIXELS - 1) as f32);
        assert_eq!(
            frame.readings()[FRAME_WIDTH as usize - 1],
            (FRAME_PIXELS - FRAME_WIDTH as usize) as f32
        );
    }
}
