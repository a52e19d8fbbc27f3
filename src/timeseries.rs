//! # Time Series Storage Module
//!
//! Bounded, time-ordered per-channel history with a short-lived pending queue.
//!
//! ## Key Types
//! - `Point`: One immutable (timestamp, value) sample
//! - `SeriesBuffer`: FIFO history capped at `capacity` plus the points appended
//!   since the last render flush
//! - `Clock`: Source of ingestion timestamps
//!
//! Timestamps are assigned at arrival, so appends are naturally non-decreasing
//! and window lookups can binary search.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub time: Timestamp,
    pub value: f64,
}

/// Source of "now" for ingestion, windowing and marker retention
pub trait Clock {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic replays and tests.
///
/// Clones share the same time source.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: Rc::new(Cell::new(start.timestamp_millis())),
        }
    }

    pub fn set(&self, time: Timestamp) {
        self.millis.set(time.timestamp_millis());
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis.set(self.millis.get() + by.num_milliseconds());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Utc.timestamp_millis_opt(self.millis.get())
            .single()
            .unwrap_or_default()
    }
}

pub struct SeriesBuffer {
    main: VecDeque<Point>,
    pending: VecDeque<Point>,
    capacity: usize,
}

impl SeriesBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            main: VecDeque::new(),
            pending: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, evicting the oldest one once the buffer is over capacity
    pub fn append(&mut self, time: Timestamp, value: f64) {
        let point = Point { time, value };
        self.main.push_back(point);
        if self.main.len() > self.capacity {
            self.main.pop_front();
        }

        // Points older than the whole history can never reach the chart
        if self.pending.len() == self.capacity {
            self.pending.pop_front();
        }
        self.pending.push_back(point);
    }

    /// Take the points appended since the last flush. Never touches history.
    pub fn drain_pending(&mut self) -> Vec<Point> {
        self.pending.drain(..).collect()
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.main.len()
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.main.iter()
    }

    pub fn last_point(&self) -> Option<&Point> {
        self.main.back()
    }

    /// Points with `time >= start`
    pub fn since(&self, start: Timestamp) -> impl Iterator<Item = &Point> {
        let idx = self.main.partition_point(|p| p.time < start);
        self.main.range(idx..)
    }

    /// Most recent point strictly before `start`
    pub fn last_before(&self, start: Timestamp) -> Option<&Point> {
        let idx = self.main.partition_point(|p| p.time < start);
        idx.checked_sub(1).and_then(|i| self.main.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn values(buffer: &SeriesBuffer) -> Vec<f64> {
        buffer.points().map(|p| p.value).collect()
    }

    #[test]
    fn test_append_below_capacity() {
        let mut buffer = SeriesBuffer::new(5);
        for i in 0..3 {
            buffer.append(at(i), i as f64);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(values(&buffer), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_append_evicts_oldest() {
        for capacity in [1usize, 2, 7] {
            let mut buffer = SeriesBuffer::new(capacity);
            for total in 1..=20usize {
                buffer.append(at(total as i64), total as f64);
                assert_eq!(buffer.len(), total.min(capacity));
                let expected: Vec<f64> = ((total - total.min(capacity) + 1)..=total)
                    .map(|v| v as f64)
                    .collect();
                assert_eq!(values(&buffer), expected);
            }
        }
    }

    #[test]
    fn test_drain_pending_twice() {
        let mut buffer = SeriesBuffer::new(10);
        buffer.append(at(0), 1.0);
        buffer.append(at(1), 2.0);

        let drained = buffer.drain_pending();
        assert_eq!(drained.len(), 2);
        assert!(buffer.drain_pending().is_empty());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_pending_survives_eviction() {
        let mut buffer = SeriesBuffer::new(2);
        buffer.append(at(0), 1.0);
        buffer.drain_pending();
        buffer.append(at(1), 2.0);
        buffer.append(at(2), 3.0);

        let drained: Vec<f64> = buffer.drain_pending().iter().map(|p| p.value).collect();
        assert_eq!(drained, vec![2.0, 3.0]);
        assert_eq!(values(&buffer), vec![2.0, 3.0]);
    }

    #[test]
    fn test_pending_bounded_by_capacity() {
        let mut buffer = SeriesBuffer::new(3);
        for i in 0..10 {
            buffer.append(at(i), i as f64);
        }
        let drained: Vec<f64> = buffer.drain_pending().iter().map(|p| p.value).collect();
        assert_eq!(drained, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_since_and_last_before() {
        let mut buffer = SeriesBuffer::new(10);
        for i in [0, 10, 20, 30] {
            buffer.append(at(i), i as f64);
        }

        let in_window: Vec<f64> = buffer.since(at(10)).map(|p| p.value).collect();
        assert_eq!(in_window, vec![10.0, 20.0, 30.0]);
        assert_eq!(buffer.last_before(at(10)).map(|p| p.value), Some(0.0));
        assert_eq!(buffer.last_before(at(15)).map(|p| p.value), Some(10.0));
        assert!(buffer.last_before(at(0)).is_none());
        assert_eq!(buffer.since(at(31)).count(), 0);
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(at(0));
        let other = clock.clone();
        other.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now(), at(5));
    }
}
