//! # Graph Engine Module
//!
//! Single-threaded facade tying ingestion, buffering, the chart and saving
//! together. All state is owned here and mutated from one thread, so there
//! are no locks; the pending queues are the only hand-off between ingestion
//! and the render tick.
//!
//! ## Lifecycle
//! - `init`: create the chart surface and publish the full configuration
//! - ingestion (`process_record`, snapshots, connectivity markers) while running
//! - `tick` from the render timer
//! - `dispose`: stop accepting data and release the chart
//!
//! ## Failure Policy
//! A missing chart turns chart operations into no-ops. Chart and save-sink
//! failures are logged and degrade (download fallback, no chart) instead of
//! propagating.

use crate::channels::ChannelRegistry;
use crate::chart::{ChartConfig, ChartFactory, ChartSurface, Theme};
use crate::config::Config;
use crate::export::{export_window, Artifact, SaveChain};
use crate::markers::ConnectivityEventLog;
use crate::record::{DeviceSnapshot, LogRecord};
use crate::router::RecordRouter;
use crate::scheduler::{RenderScheduler, TickReport};
use crate::sensors::{LabelCache, SensorRegistry};
use crate::timeseries::Clock;
use std::path::PathBuf;

pub struct GraphEngine {
    clock: Box<dyn Clock>,
    channels: ChannelRegistry,
    sensors: SensorRegistry,
    labels: LabelCache,
    markers: ConnectivityEventLog,
    router: RecordRouter,
    scheduler: RenderScheduler,
    factory: Box<dyn ChartFactory>,
    chart: Option<Box<dyn ChartSurface>>,
    theme: Theme,
    saver: SaveChain,
    running: bool,
}

impl GraphEngine {
    pub fn new(
        config: &Config,
        clock: Box<dyn Clock>,
        factory: Box<dyn ChartFactory>,
        saver: SaveChain,
    ) -> Self {
        Self {
            clock,
            channels: ChannelRegistry::new(config.max_points),
            sensors: SensorRegistry::new(),
            labels: LabelCache::default(),
            markers: ConnectivityEventLog::new(),
            router: RecordRouter::new(),
            scheduler: RenderScheduler::new(config.time_window()),
            factory,
            chart: None,
            theme: config.theme,
            saver,
            running: false,
        }
    }

    /// Create the chart and start accepting data. Repeated calls are ignored.
    pub fn init(&mut self) {
        if self.running {
            log::debug!("Graph engine already initialized, skipping");
            return;
        }
        log::info!("Graph engine init ({:?} theme)", self.theme);

        match self.factory.create(self.theme) {
            Ok(chart) => {
                self.chart = Some(chart);
                self.publish_option();
            }
            Err(e) => log::error!("Graph unavailable: {}", e),
        }
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn chart_ready(&self) -> bool {
        self.chart.is_some()
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn sensors(&self) -> &SensorRegistry {
        &self.sensors
    }

    pub fn markers(&self) -> &ConnectivityEventLog {
        &self.markers
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn time_window(&self) -> chrono::Duration {
        self.scheduler.time_window()
    }

    /// Route one decoded log record. Returns the number of samples stored.
    pub fn process_record(&mut self, record: &LogRecord) -> usize {
        if !self.running {
            return 0;
        }
        let now = self.clock.now();
        self.router.route(record, now, &mut self.channels)
    }

    /// Discover sensors in a device snapshot. Returns labels of new sensors.
    pub fn observe_snapshot(&mut self, snapshot: &DeviceSnapshot) -> Vec<String> {
        if !self.running {
            return Vec::new();
        }
        let discovery = self
            .sensors
            .observe_snapshot(snapshot, &self.labels, &mut self.channels);
        if discovery.changed() {
            self.publish_option();
        }
        discovery.added
    }

    /// Store the readings of registered sensors present in a snapshot
    pub fn record_sensor_readings(&mut self, snapshot: &DeviceSnapshot) -> usize {
        if !self.running {
            return 0;
        }
        let now = self.clock.now();
        self.sensors.record_readings(snapshot, now, &mut self.channels)
    }

    pub fn labels_mut(&mut self) -> &mut LabelCache {
        &mut self.labels
    }

    /// Re-apply user labels from the label cache
    pub fn refresh_sensor_labels(&mut self) -> bool {
        let changed = self.sensors.refresh_labels(&self.labels, &mut self.channels);
        if changed {
            self.publish_option();
        }
        changed
    }

    pub fn record_disconnect(&mut self) {
        let now = self.clock.now();
        self.markers.record_disconnect(now);
        self.publish_option();
    }

    pub fn record_reconnect(&mut self) {
        let now = self.clock.now();
        self.markers.record_reconnect(now);
        self.publish_option();
    }

    /// Render tick: flush pending points and slide the window
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let chart = self.chart.as_deref_mut();
        self.scheduler.tick(now, &mut self.channels, chart)
    }

    /// Change the window width; zero is ignored. Applies from the next tick.
    pub fn set_time_window(&mut self, minutes: u32) {
        if minutes == 0 {
            return;
        }
        self.scheduler
            .set_time_window(chrono::Duration::minutes(i64::from(minutes)));
    }

    /// Dispose and recreate the chart for a new theme. On failure no chart
    /// is held.
    pub fn set_theme(&mut self, theme: Theme) {
        if self.theme == theme {
            return;
        }
        self.theme = theme;

        let Some(mut old) = self.chart.take() else {
            return;
        };
        old.dispose();
        drop(old);

        match self.factory.create(theme) {
            Ok(chart) => {
                self.chart = Some(chart);
                self.publish_option();
            }
            Err(e) => log::error!("Error changing theme: {}", e),
        }
    }

    /// Export the current window as CSV. Returns where it was saved.
    pub fn export_data(&mut self, auto: bool) -> Option<PathBuf> {
        let now = self.clock.now();
        let table = export_window(&self.channels, now, self.scheduler.time_window());
        let filename = Artifact::Data.filename(auto, now);

        match self.saver.save(&filename, table.to_csv().as_bytes()) {
            Ok(path) => {
                if auto {
                    log::info!("Auto-captured graph data to disk: {}", path.display());
                }
                Some(path)
            }
            Err(e) => {
                log::error!("Failed to save {}: {}", filename, e);
                None
            }
        }
    }

    /// Save a PNG capture of the chart. No-op without a chart.
    pub fn capture(&mut self, auto: bool) -> Option<PathBuf> {
        let chart = self.chart.as_mut()?;
        let png = match chart.capture_png(self.theme.background()) {
            Ok(png) => png,
            Err(e) => {
                log::warn!("Chart capture skipped: {}", e);
                return None;
            }
        };

        let filename = Artifact::Graph.filename(auto, self.clock.now());
        match self.saver.save(&filename, &png) {
            Ok(path) => {
                if auto {
                    log::info!("Auto-captured graph screenshot to disk: {}", path.display());
                }
                Some(path)
            }
            Err(e) => {
                log::error!("Failed to save {}: {}", filename, e);
                None
            }
        }
    }

    /// Stop accepting data and release the chart
    pub fn dispose(&mut self) {
        log::info!("Graph engine dispose");
        self.running = false;
        if let Some(mut chart) = self.chart.take() {
            chart.dispose();
        }
    }

    /// Publish the full configuration. It embeds all history, so pending
    /// points are cleared to keep the next tick from appending them twice.
    fn publish_option(&mut self) {
        let Some(chart) = self.chart.as_mut() else {
            return;
        };
        let window_start = self.scheduler.window_start(self.clock.now());
        let config = ChartConfig::build(&self.channels, self.markers.markers(), self.theme, window_start);
        chart.set_option(&config);
        self.channels.clear_pending();
    }
}
