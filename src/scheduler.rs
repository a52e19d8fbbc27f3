//! # Render Scheduler Module
//!
//! The periodic render tick. Ingestion only ever appends to buffers; this is
//! the single place where buffered points reach the chart.
//!
//! ## Each Tick
//! 1. Compute the window lower bound `now - time_window`
//! 2. If any channel has pending points, drain them and append them to the
//!    chart by series index, then reset every pending queue
//! 3. Push the lower bound to every time axis, even when no data arrived,
//!    so the visible window keeps sliding
//!
//! Changing the window only changes the bound used by later ticks; history is
//! never replayed.

use crate::channels::ChannelRegistry;
use crate::chart::{axis_bounds, ChartSurface};
use crate::timeseries::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub window_start: Timestamp,
    pub flushed_points: usize,
}

pub struct RenderScheduler {
    time_window: chrono::Duration,
}

impl RenderScheduler {
    pub fn new(time_window: chrono::Duration) -> Self {
        Self { time_window }
    }

    pub fn time_window(&self) -> chrono::Duration {
        self.time_window
    }

    /// Takes effect on the next tick
    pub fn set_time_window(&mut self, time_window: chrono::Duration) {
        self.time_window = time_window;
    }

    pub fn window_start(&self, now: Timestamp) -> Timestamp {
        now - self.time_window
    }

    pub fn tick(
        &mut self,
        now: Timestamp,
        registry: &mut ChannelRegistry,
        mut chart: Option<&mut (dyn ChartSurface + 'static)>,
    ) -> TickReport {
        let window_start = self.window_start(now);
        let mut flushed_points = 0;

        if registry.has_pending() {
            for (series_index, points) in registry.drain_pending() {
                // Without a chart the points are still in history and reach
                // the next full configuration
                if let Some(chart) = chart.as_deref_mut() {
                    chart.append_data(series_index, &points);
                    flushed_points += points.len();
                }
            }
            registry.clear_pending();
        }

        if let Some(chart) = chart {
            chart.set_x_axes(&axis_bounds(window_start));
        }

        if flushed_points > 0 {
            log::debug!("Render tick flushed {} point(s)", flushed_points);
        }
        TickReport {
            window_start,
            flushed_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::FixedChannel;
    use crate::chart::{AxisBound, ChartConfig};
    use crate::error::ChartError;
    use crate::timeseries::Point;
    use chrono::{Duration, TimeZone, Utc};

    #[derive(Default)]
    struct FakeChart {
        appends: Vec<(usize, Vec<Point>)>,
        bounds: Vec<Vec<AxisBound>>,
    }

    impl ChartSurface for FakeChart {
        fn set_option(&mut self, _config: &ChartConfig) {}

        fn append_data(&mut self, series_index: usize, points: &[Point]) {
            self.appends.push((series_index, points.to_vec()));
        }

        fn set_x_axes(&mut self, bounds: &[AxisBound]) {
            self.bounds.push(bounds.to_vec());
        }

        fn capture_png(&mut self, _background: &str) -> Result<Vec<u8>, ChartError> {
            Err(ChartError::CaptureUnsupported)
        }

        fn dispose(&mut self) {}
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_tick_flushes_pending_by_series_index() {
        let mut scheduler = RenderScheduler::new(Duration::minutes(10));
        let mut registry = ChannelRegistry::new(100);
        let mut chart = FakeChart::default();
        registry.push(&FixedChannel::Modulation.id(), at(0), 40.0);
        registry.push(&FixedChannel::Outside.id(), at(1), 5.0);

        let report = scheduler.tick(at(2), &mut registry, Some(&mut chart));

        assert_eq!(report.flushed_points, 2);
        assert_eq!(report.window_start, at(2) - Duration::minutes(10));
        let indices: Vec<usize> = chart.appends.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![3, 9]);
        assert!(!registry.has_pending());
    }

    #[test]
    fn test_tick_without_data_still_slides_window() {
        let mut scheduler = RenderScheduler::new(Duration::minutes(10));
        let mut registry = ChannelRegistry::new(100);
        let mut chart = FakeChart::default();

        scheduler.tick(at(0), &mut registry, Some(&mut chart));
        scheduler.tick(at(2), &mut registry, Some(&mut chart));

        assert!(chart.appends.is_empty());
        assert_eq!(chart.bounds.len(), 2);
        assert_eq!(chart.bounds[1].len(), 5);
        assert!(chart.bounds[1].iter().all(|b| b.min == at(2) - Duration::minutes(10)));
    }

    #[test]
    fn test_window_change_applies_next_tick_without_replay() {
        let mut scheduler = RenderScheduler::new(Duration::minutes(60));
        let mut registry = ChannelRegistry::new(100);
        let mut chart = FakeChart::default();
        registry.push(&FixedChannel::Room.id(), at(0), 20.0);
        scheduler.tick(at(1), &mut registry, Some(&mut chart));

        scheduler.set_time_window(Duration::minutes(5));
        let report = scheduler.tick(at(2), &mut registry, Some(&mut chart));

        assert_eq!(report.window_start, at(2) - Duration::minutes(5));
        assert_eq!(report.flushed_points, 0);
        assert_eq!(chart.appends.len(), 1);
    }

    #[test]
    fn test_tick_without_chart_discards_pending() {
        let mut scheduler = RenderScheduler::new(Duration::minutes(10));
        let mut registry = ChannelRegistry::new(100);
        registry.push(&FixedChannel::Room.id(), at(0), 20.0);

        let report = scheduler.tick(at(1), &mut registry, None);

        assert_eq!(report.flushed_points, 0);
        assert!(!registry.has_pending());
        assert_eq!(registry.get(&FixedChannel::Room.id()).unwrap().buffer.len(), 1);
    }
}
