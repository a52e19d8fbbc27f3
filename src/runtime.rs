//! # Runtime Module
//!
//! Drives a `GraphEngine` from one thread. Feed events from the gateway,
//! control commands and three timers (render tick, auto-capture,
//! auto-export) are multiplexed with `crossbeam_channel::select!`; every
//! timer is an independent receiver that can be replaced to cancel it.

use crate::chart::Theme;
use crate::engine::GraphEngine;
use crate::record::{DeviceSnapshot, LogRecord};
use crossbeam_channel::{never, select, tick, Receiver};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// One event from the gateway side
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feed {
    Record(LogRecord),
    Snapshot { entries: DeviceSnapshot },
    Disconnect,
    Reconnect,
    SensorLabel { address: String, label: String },
}

/// Parse one newline-delimited feed message. Blank and malformed lines are
/// expected noise and yield `None`.
pub fn parse_feed_line(line: &str) -> Option<Feed> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(feed) => Some(feed),
        Err(e) => {
            log::trace!("Skipping malformed feed line: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetTimeWindow(u32),
    SetAutoCapture(bool),
    SetAutoExport(bool),
    SetTheme(Theme),
    ExportNow,
    CaptureNow,
    Shutdown,
}

enum Event {
    Feed(Feed),
    FeedClosed,
    Command(Command),
    CommandsClosed,
    Render,
    AutoCapture,
    AutoExport,
}

pub struct EngineLoop {
    engine: GraphEngine,
    feed: Receiver<Feed>,
    commands: Receiver<Command>,
    render: Receiver<Instant>,
    auto_interval: Duration,
    auto_capture: Receiver<Instant>,
    auto_export: Receiver<Instant>,
}

fn timer(enabled: bool, interval: Duration) -> Receiver<Instant> {
    if enabled {
        tick(interval)
    } else {
        never()
    }
}

impl EngineLoop {
    pub fn new(
        engine: GraphEngine,
        feed: Receiver<Feed>,
        commands: Receiver<Command>,
        render_interval: Duration,
        auto_interval: Duration,
    ) -> Self {
        Self {
            engine,
            feed,
            commands,
            render: tick(render_interval),
            auto_interval,
            auto_capture: never(),
            auto_export: never(),
        }
    }

    pub fn set_auto_capture(&mut self, enabled: bool) {
        log::info!("Auto-capture {}", if enabled { "enabled" } else { "disabled" });
        self.auto_capture = timer(enabled, self.auto_interval);
    }

    pub fn set_auto_export(&mut self, enabled: bool) {
        log::info!("Auto-export {}", if enabled { "enabled" } else { "disabled" });
        self.auto_export = timer(enabled, self.auto_interval);
    }

    fn next_event(&self) -> Event {
        select! {
            recv(self.feed) -> msg => msg.map_or(Event::FeedClosed, Event::Feed),
            recv(self.commands) -> msg => msg.map_or(Event::CommandsClosed, Event::Command),
            recv(self.render) -> _ => Event::Render,
            recv(self.auto_capture) -> _ => Event::AutoCapture,
            recv(self.auto_export) -> _ => Event::AutoExport,
        }
    }

    /// Initialise the engine and run until shutdown or until both inputs are
    /// closed. Returns the disposed engine.
    pub fn run(mut self) -> GraphEngine {
        self.engine.init();
        let mut feed_open = true;
        let mut commands_open = true;

        while feed_open || commands_open {
            match self.next_event() {
                Event::Feed(feed) => self.handle_feed(feed),
                Event::FeedClosed => {
                    log::info!("Gateway feed closed");
                    feed_open = false;
                    self.feed = never();
                }
                Event::Command(Command::Shutdown) => break,
                Event::Command(command) => self.handle_command(command),
                Event::CommandsClosed => {
                    log::debug!("Command channel closed");
                    commands_open = false;
                    self.commands = never();
                }
                Event::Render => {
                    self.engine.tick();
                }
                Event::AutoCapture => {
                    self.engine.capture(true);
                }
                Event::AutoExport => {
                    self.engine.export_data(true);
                }
            }
        }

        self.engine.dispose();
        self.engine
    }

    fn handle_feed(&mut self, feed: Feed) {
        match feed {
            Feed::Record(record) => {
                self.engine.process_record(&record);
            }
            Feed::Snapshot { entries } => {
                self.engine.observe_snapshot(&entries);
                self.engine.record_sensor_readings(&entries);
            }
            Feed::Disconnect => self.engine.record_disconnect(),
            Feed::Reconnect => self.engine.record_reconnect(),
            Feed::SensorLabel { address, label } => {
                let label = label.trim();
                if label.is_empty() {
                    self.engine.labels_mut().remove(&address);
                } else {
                    self.engine.labels_mut().insert(&address, label);
                }
                self.engine.refresh_sensor_labels();
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetTimeWindow(minutes) => self.engine.set_time_window(minutes),
            Command::SetAutoCapture(enabled) => self.set_auto_capture(enabled),
            Command::SetAutoExport(enabled) => self.set_auto_export(enabled),
            Command::SetTheme(theme) => self.engine.set_theme(theme),
            Command::ExportNow => {
                if let Some(path) = self.engine.export_data(false) {
                    log::info!("Exported graph data to {}", path.display());
                }
            }
            Command::CaptureNow => {
                if let Some(path) = self.engine.capture(false) {
                    log::info!("Saved graph screenshot to {}", path.display());
                }
            }
            Command::Shutdown => {}
        }
    }
}
