//! Bounded, scale-aware history of recent samples for live display.
//!
//! The buffer holds at most [`capacity`] samples for the current time scale
//! and sampling interval. Changing the scale rebuilds the capacity but keeps
//! the stored samples; the display window is applied when a snapshot is
//! taken, and the next push evicts down to the new capacity.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::sample::Sample;
use crate::scale::TimeScale;

/// Minimum vertical span of the weight axis (kg).
const MIN_Y_SPAN: f64 = 0.2;
/// Fraction of the span added above and below the data.
const Y_PADDING: f64 = 0.1;

/// Number of samples that fit in the scale's window at `interval_ms`.
///
/// `floor(window_seconds / interval_seconds) + 1`.
pub fn capacity(scale: TimeScale, interval_ms: u64) -> usize {
    let interval_ms = interval_ms.max(1);
    (scale.window_seconds() * 1000 / interval_ms) as usize + 1
}

/// One plotted point: elapsed time in scale units and both weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub elapsed: f64,
    pub weight_1: f64,
    pub weight_2: f64,
}

/// Axis ranges for a chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl AxisBounds {
    /// Bounds for an empty chart on `scale`.
    pub fn empty(scale: TimeScale) -> Self {
        Self {
            x: [0.0, scale.window()],
            y: [0.0, 1.0],
        }
    }

    /// Bounds covering `points` on `scale`.
    pub fn fit(scale: TimeScale, points: &[SeriesPoint]) -> Self {
        let Some(last) = points.last() else {
            return Self::empty(scale);
        };

        let window = scale.window();
        let x = if last.elapsed > window {
            [last.elapsed - window, last.elapsed]
        } else {
            [0.0, window]
        };

        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in points {
            lo = lo.min(p.weight_1).min(p.weight_2);
            hi = hi.max(p.weight_1).max(p.weight_2);
        }
        let span = (hi - lo).max(MIN_Y_SPAN);
        let pad = span * Y_PADDING;
        let lower = lo - pad;
        let mut upper = hi + pad;
        if !(upper - lower).is_finite() || upper <= lower {
            upper = lower + 1.0;
        }

        Self {
            x,
            y: [lower, upper],
        }
    }
}

/// Windowed view of the buffer, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferSnapshot {
    pub scale: TimeScale,
    pub points: Vec<SeriesPoint>,
    pub bounds: AxisBounds,
}

impl BufferSnapshot {
    pub fn empty(scale: TimeScale) -> Self {
        Self {
            scale,
            points: Vec::new(),
            bounds: AxisBounds::empty(scale),
        }
    }

    /// Build a snapshot from points already expressed in `scale` units,
    /// keeping only the trailing run inside the scale's window.
    pub fn windowed(scale: TimeScale, mut points: Vec<SeriesPoint>) -> Self {
        if let Some(last) = points.last() {
            let cutoff = last.elapsed - scale.window();
            let first_inside = points.partition_point(|p| p.elapsed < cutoff);
            points.drain(..first_inside);
        }
        let bounds = AxisBounds::fit(scale, &points);
        Self {
            scale,
            points,
            bounds,
        }
    }
}

/// FIFO ring of recent samples.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<Sample>,
    scale: TimeScale,
    interval_ms: u64,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(scale: TimeScale, interval_ms: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            scale,
            interval_ms,
            capacity: capacity(scale, interval_ms),
        }
    }

    /// Append a sample, evicting the oldest ones beyond capacity.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Switch time scale. Stored samples are kept.
    pub fn rewindow(&mut self, scale: TimeScale) {
        self.scale = scale;
        self.capacity = capacity(scale, self.interval_ms);
    }

    /// Switch sampling interval. Stored samples are kept.
    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
        self.capacity = capacity(self.scale, interval_ms);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn scale(&self) -> TimeScale {
        self.scale
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Trailing samples inside the current window, elapsed time measured
    /// from `session_start`.
    pub fn snapshot(&self, session_start: NaiveDateTime) -> BufferSnapshot {
        let skip = self.samples.len().saturating_sub(self.capacity);
        let points = self
            .samples
            .iter()
            .skip(skip)
            .map(|s| SeriesPoint {
                elapsed: self.scale.to_units(s.elapsed_secs(session_start)),
                weight_1: s.weight_1,
                weight_2: s.weight_2,
            })
            .collect();
        BufferSnapshot::windowed(self.scale, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Reading;
    use chrono::{NaiveDate, TimeDelta};
    use proptest::prelude::*;

    fn origin() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn sample_at(ms: i64, w1: f64, w2: f64) -> Sample {
        Sample::new(
            origin() + TimeDelta::milliseconds(ms),
            Reading {
                temp_1: 29.8,
                temp_2: 27.3,
                weight_1: w1,
                weight_2: w2,
            },
            0.0,
        )
    }

    // -----------------------------------------------------------------------
    // Capacity
    // -----------------------------------------------------------------------

    #[test]
    fn test_capacity_two_second_interval() {
        assert_eq!(capacity(TimeScale::Seconds, 2_000), 31);
        assert_eq!(capacity(TimeScale::Minutes, 2_000), 1_801);
        assert_eq!(capacity(TimeScale::Hours, 2_000), 43_201);
    }

    #[test]
    fn test_capacity_floors() {
        // 60 / 7 = 8.57 -> 8 + 1
        assert_eq!(capacity(TimeScale::Seconds, 7_000), 9);
        // interval longer than the window still keeps one sample
        assert_eq!(capacity(TimeScale::Seconds, 120_000), 1);
    }

    // -----------------------------------------------------------------------
    // Push / eviction
    // -----------------------------------------------------------------------

    #[test]
    fn test_forty_pushes_keep_thirty_one_newest() {
        let mut buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        for i in 0..40 {
            buf.push(sample_at(i * 2_000, 30.0 - i as f64 * 0.01, 15.0));
        }
        assert_eq!(buf.len(), 31);
        let first = buf.iter().next().unwrap();
        assert_eq!(first.captured_at, origin() + TimeDelta::milliseconds(9 * 2_000));
        assert_eq!(
            buf.latest().unwrap().captured_at,
            origin() + TimeDelta::milliseconds(39 * 2_000)
        );
    }

    #[test]
    fn test_rewindow_keeps_samples_until_next_push() {
        let mut buf = HistoryBuffer::new(TimeScale::Minutes, 2_000);
        for i in 0..100 {
            buf.push(sample_at(i * 2_000, 30.0, 15.0));
        }
        buf.rewindow(TimeScale::Seconds);
        assert_eq!(buf.capacity(), 31);
        assert_eq!(buf.len(), 100);
        buf.push(sample_at(100 * 2_000, 30.0, 15.0));
        assert_eq!(buf.len(), 31);
    }

    #[test]
    fn test_set_interval_rebuilds_capacity() {
        let mut buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        buf.set_interval(1_000);
        assert_eq!(buf.capacity(), 61);
        assert_eq!(buf.scale(), TimeScale::Seconds);
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    #[test]
    fn test_snapshot_empty() {
        let buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        let snap = buf.snapshot(origin());
        assert!(snap.points.is_empty());
        assert_eq!(snap.bounds.x, [0.0, 60.0]);
        assert_eq!(snap.bounds.y, [0.0, 1.0]);
    }

    #[test]
    fn test_snapshot_x_range_before_window_fills() {
        let mut buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        for i in 0..5 {
            buf.push(sample_at(i * 2_000, 30.0, 15.0));
        }
        let snap = buf.snapshot(origin());
        assert_eq!(snap.points.len(), 5);
        assert_eq!(snap.bounds.x, [0.0, 60.0]);
    }

    #[test]
    fn test_snapshot_x_range_scrolls() {
        let mut buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        for i in 0..50 {
            buf.push(sample_at(i * 2_000, 30.0, 15.0));
        }
        let snap = buf.snapshot(origin());
        let latest = 98.0;
        assert_eq!(snap.bounds.x, [latest - 60.0, latest]);
        assert!(snap.points.iter().all(|p| p.elapsed >= latest - 60.0));
    }

    #[test]
    fn test_snapshot_minutes_units() {
        let mut buf = HistoryBuffer::new(TimeScale::Minutes, 30_000);
        buf.push(sample_at(0, 30.0, 15.0));
        buf.push(sample_at(90_000, 30.0, 15.0));
        let snap = buf.snapshot(origin());
        assert!((snap.points[1].elapsed - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_rewindow_excludes_lazily() {
        let mut buf = HistoryBuffer::new(TimeScale::Minutes, 2_000);
        for i in 0..100 {
            buf.push(sample_at(i * 2_000, 30.0, 15.0));
        }
        buf.rewindow(TimeScale::Seconds);
        let snap = buf.snapshot(origin());
        assert_eq!(buf.len(), 100);
        assert!(snap.points.len() <= 31);
        assert_eq!(snap.points.last().unwrap().elapsed, 198.0);
    }

    #[test]
    fn test_y_bounds_minimum_span() {
        let mut buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        buf.push(sample_at(0, 20.0, 20.0));
        let snap = buf.snapshot(origin());
        let [lo, hi] = snap.bounds.y;
        assert!((lo - (20.0 - 0.02)).abs() < 1e-9);
        assert!((hi - (20.0 + 0.02)).abs() < 1e-9);
    }

    #[test]
    fn test_y_bounds_pad_ten_percent() {
        let mut buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        buf.push(sample_at(0, 30.0, 10.0));
        let snap = buf.snapshot(origin());
        let [lo, hi] = snap.bounds.y;
        assert!((lo - 8.0).abs() < 1e-9);
        assert!((hi - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear() {
        let mut buf = HistoryBuffer::new(TimeScale::Seconds, 2_000);
        buf.push(sample_at(0, 1.0, 1.0));
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.latest().is_none());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(
            interval_ms in 100u64..200_000,
            ops in proptest::collection::vec(0u8..4, 1..400),
        ) {
            let mut buf = HistoryBuffer::new(TimeScale::Seconds, interval_ms);
            let mut t = 0i64;
            for op in ops {
                match op {
                    0 => buf.rewindow(buf.scale().next()),
                    _ => {
                        t += interval_ms as i64;
                        buf.push(sample_at(t, 30.0, 15.0));
                        prop_assert!(buf.len() <= capacity(buf.scale(), interval_ms));
                    }
                }
            }
        }
    }
}
