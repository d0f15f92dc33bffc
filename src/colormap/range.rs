// SPDX-License-Identifier: GPL-3.0-or-later
use tracing::trace;

use crate::frame::TemperatureFrame;

/// How much of the (rate-limited) distance to the target a bound moves each frame.
const SKEW_DAMPING: f32 = 0.1;

/// The temperatures mapped to the first and last colormap entries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TemperatureRange {
    pub(crate) low: f32,
    pub(crate) high: f32,
}

/// Slowly drags the displayed temperature range towards the range of the frames being shown.
///
/// Each bound moves towards its target by at most `max_skew * 0.1` per frame, and never past it.
/// A `max_skew` of 0 leaves the range fixed at its initial values.
#[derive(Clone, Debug)]
pub(crate) struct TemperatureRangeTracker {
    range: TemperatureRange,
    primed: bool,
}

impl TemperatureRangeTracker {
    pub(crate) fn new(low: f32, high: f32) -> Self {
        Self {
            range: TemperatureRange { low, high },
            primed: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn range(&self) -> TemperatureRange {
        self.range
    }

    /// Move both bounds one step towards the given frame extremes.
    ///
    /// Negative or NaN `max_skew` values are treated as 0.
    pub(crate) fn advance(&mut self, frame_min: f32, frame_max: f32, max_skew: f32) -> TemperatureRange {
        let max_skew = if max_skew > 0.0 { max_skew } else { 0.0 };
        self.range.low = skew(self.range.low, frame_min, max_skew);
        self.range.high = skew(self.range.high, frame_max, max_skew);
        trace!(low = self.range.low, high = self.range.high, "advanced temperature range");
        self.range
    }

    /// The range to render `frame` with.
    ///
    /// The first frame is shown with the initial range verbatim; every later frame advances the
    /// range towards its own extremes first. Frames without any usable readings leave the range
    /// alone.
    pub(crate) fn observe(&mut self, frame: &TemperatureFrame, max_skew: f32) -> TemperatureRange {
        if !self.primed {
            self.primed = true;
            return self.range;
        }
        match frame.min_max() {
            Some((frame_min, frame_max)) => self.advance(frame_min, frame_max, max_skew),
            None => self.range,
        }
    }
}

fn skew(current: f32, target: f32, max_skew: f32) -> f32 {
    let delta = target - current;
    // Also covers a NaN target, which would otherwise poison the bound.
    if !(delta.abs() > 0.0) {
        return current;
    }
    let step = delta.abs().min(max_skew) * delta.signum();
    current + step * SKEW_DAMPING
}

#[cfg(test)]
mod test {
    use float_cmp::{approx_eq, F32Margin};

    use super::{skew, TemperatureRange, TemperatureRangeTracker};
    use crate::frame::{TemperatureFrame, FRAME_PIXELS};

    fn spread_frame(min: f32, max: f32) -> TemperatureFrame {
        let mut readings = vec![(min + max) / 2.0; FRAME_PIXELS];
        readings[0] = min;
        readings[FRAME_PIXELS - 1] = max;
        TemperatureFrame::from_vec(readings).unwrap()
    }

    #[test]
    fn widening_scenario() {
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let range = tracker.advance(20.0, 50.0, 1.0);
        assert!(approx_eq!(f32, range.low, 24.9, F32Margin::default()));
        assert!(approx_eq!(f32, range.high, 45.1, F32Margin::default()));
    }

    #[test]
    fn narrowing() {
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let range = tracker.advance(30.0, 40.0, 2.0);
        assert!(approx_eq!(f32, range.low, 25.2, F32Margin::default()));
        assert!(approx_eq!(f32, range.high, 44.8, F32Margin::default()));
    }

    #[test]
    fn small_delta_is_not_rate_limited() {
        // 0.05 away with a max skew of 1.0: the whole delta is used, then damped.
        assert!(approx_eq!(f32, skew(25.0, 24.95, 1.0), 24.995, F32Margin::default()));
    }

    #[test]
    fn zero_delta() {
        assert_eq!(skew(25.0, 25.0, 1.0), 25.0);
    }

    #[test]
    fn nan_target() {
        assert_eq!(skew(25.0, f32::NAN, 1.0), 25.0);
    }

    #[test]
    fn zero_skew_is_fixed() {
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        for (min, max) in &[(-20.0, 80.0), (30.0, 31.0), (25.0, 45.0), (100.0, -100.0)] {
            assert_eq!(
                tracker.advance(*min, *max, 0.0),
                TemperatureRange {
                    low: 25.0,
                    high: 45.0
                }
            );
        }
    }

    #[test]
    fn negative_skew_is_fixed() {
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let range = tracker.advance(0.0, 90.0, -5.0);
        assert_eq!(range, TemperatureRange { low: 25.0, high: 45.0 });
    }

    #[test]
    fn never_overshoots() {
        for max_skew in &[0.0f32, 0.01, 0.5, 1.0, 10.0, 1000.0] {
            for target in &[-50.0f32, 24.0, 24.99, 25.0, 25.01, 26.0, 300.0] {
                let current = 25.0f32;
                let next = skew(current, *target, *max_skew);
                let before = (target - current).abs();
                let after = (target - next).abs();
                assert!(after <= before, "moved away: {} -> {} (target {})", current, next, target);
                // Still on the same side of the target (or on it).
                assert!(
                    (target - next) * (target - current) >= 0.0,
                    "overshot: {} -> {} (target {})",
                    current,
                    next,
                    target
                );
            }
        }
    }

    #[test]
    fn converges() {
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let mut range = tracker.range();
        for _ in 0..1000 {
            range = tracker.advance(20.0, 50.0, 1.0);
        }
        assert!(approx_eq!(f32, range.low, 20.0, epsilon = 0.01));
        assert!(approx_eq!(f32, range.high, 50.0, epsilon = 0.01));
    }

    #[test]
    fn first_frame_uses_initial_range() {
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        let first = tracker.observe(&spread_frame(10.0, 60.0), 1.0);
        assert_eq!(first, TemperatureRange { low: 25.0, high: 45.0 });
        let second = tracker.observe(&spread_frame(10.0, 60.0), 1.0);
        assert!(approx_eq!(f32, second.low, 24.9, F32Margin::default()));
        assert!(approx_eq!(f32, second.high, 45.1, F32Margin::default()));
    }

    #[test]
    fn all_nan_frame_keeps_range() {
        let mut tracker = TemperatureRangeTracker::new(25.0, 45.0);
        tracker.observe(&spread_frame(10.0, 60.0), 1.0);
        let frame = TemperatureFrame::from_vec(vec![f32::NAN; FRAME_PIXELS]).unwrap();
        assert_eq!(
            tracker.observe(&frame, 1.0),
            TemperatureRange { low: 25.0, high: 45.0 }
        );
    }
}
