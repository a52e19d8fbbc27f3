//! # Channel Registry Module
//!
//! Owns every channel and its `SeriesBuffer`, in stable series order.
//!
//! ## Channel Order
//! Fixed channels come first in the order the chart draws them (flame, hot
//! water, heating, modulation, then the six temperatures). Sensor channels are
//! appended as they are discovered. A channel's position never changes, so it
//! doubles as the chart's series index.
//!
//! ## Why a Registry
//! Sensors are discovered at runtime, so the set of buffers grows while the
//! engine runs. Channels are looked up by id and never by array position
//! from outside this module.

use crate::timeseries::{Point, SeriesBuffer, Timestamp};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

/// Plausible range for every temperature channel, in °C
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -50.0..=150.0;
/// Plausible range for the modulation channel, in percent
pub const PERCENT_RANGE: RangeInclusive<f64> = 0.0..=100.0;
const DIGITAL_RANGE: RangeInclusive<f64> = 0.0..=1.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The five stacked chart panels sharing one time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Flame,
    HotWater,
    Heating,
    Modulation,
    Temperature,
}

impl Panel {
    pub fn all() -> [Panel; 5] {
        [
            Panel::Flame,
            Panel::HotWater,
            Panel::Heating,
            Panel::Modulation,
            Panel::Temperature,
        ]
    }

    /// Grid/axis index of this panel in the chart
    pub fn index(&self) -> usize {
        match self {
            Panel::Flame => 0,
            Panel::HotWater => 1,
            Panel::Heating => 2,
            Panel::Modulation => 3,
            Panel::Temperature => 4,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Panel::Flame => "Flame Status",
            Panel::HotWater => "DHW Mode",
            Panel::Heating => "CH Mode",
            Panel::Modulation => "Modulation",
            Panel::Temperature => "Temperatures",
        }
    }

    pub fn is_digital(&self) -> bool {
        matches!(self, Panel::Flame | Panel::HotWater | Panel::Heating)
    }
}

/// Channels that exist from startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedChannel {
    Flame,
    DhwMode,
    ChMode,
    Modulation,
    ControlSetpoint,
    Boiler,
    Return,
    RoomSetpoint,
    Room,
    Outside,
}

impl FixedChannel {
    pub fn all() -> [FixedChannel; 10] {
        [
            FixedChannel::Flame,
            FixedChannel::DhwMode,
            FixedChannel::ChMode,
            FixedChannel::Modulation,
            FixedChannel::ControlSetpoint,
            FixedChannel::Boiler,
            FixedChannel::Return,
            FixedChannel::RoomSetpoint,
            FixedChannel::Room,
            FixedChannel::Outside,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            FixedChannel::Flame => "flame",
            FixedChannel::DhwMode => "dhwMode",
            FixedChannel::ChMode => "chMode",
            FixedChannel::Modulation => "mod",
            FixedChannel::ControlSetpoint => "ctrlSp",
            FixedChannel::Boiler => "boiler",
            FixedChannel::Return => "return",
            FixedChannel::RoomSetpoint => "roomSp",
            FixedChannel::Room => "room",
            FixedChannel::Outside => "outside",
        }
    }

    pub fn id(&self) -> ChannelId {
        ChannelId::new(self.key())
    }

    pub fn label(&self) -> &'static str {
        match self {
            FixedChannel::Flame => "Flame",
            FixedChannel::DhwMode => "DHW Mode",
            FixedChannel::ChMode => "CH Mode",
            FixedChannel::Modulation => "Modulation (%)",
            FixedChannel::ControlSetpoint => "Control SetPoint",
            FixedChannel::Boiler => "Boiler Temp",
            FixedChannel::Return => "Return Temp",
            FixedChannel::RoomSetpoint => "Room SetPoint",
            FixedChannel::Room => "Room Temp",
            FixedChannel::Outside => "Outside Temp",
        }
    }

    pub fn panel(&self) -> Panel {
        match self {
            FixedChannel::Flame => Panel::Flame,
            FixedChannel::DhwMode => Panel::HotWater,
            FixedChannel::ChMode => Panel::Heating,
            FixedChannel::Modulation => Panel::Modulation,
            _ => Panel::Temperature,
        }
    }

    /// Values outside this range are dropped, never clamped
    pub fn valid_range(&self) -> RangeInclusive<f64> {
        match self.panel() {
            Panel::Flame | Panel::HotWater | Panel::Heating => DIGITAL_RANGE,
            Panel::Modulation => PERCENT_RANGE,
            Panel::Temperature => TEMPERATURE_RANGE,
        }
    }
}

/// Theme-independent color slot; resolved against the active palette
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKey {
    Fixed(FixedChannel),
    /// Index into the 16-entry sensor palette
    Sensor(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub label: String,
    pub panel: Panel,
    pub color: ColorKey,
}

impl Channel {
    pub fn fixed(channel: FixedChannel) -> Self {
        Self {
            id: channel.id(),
            label: channel.label().to_string(),
            panel: channel.panel(),
            color: ColorKey::Fixed(channel),
        }
    }
}

pub struct Series {
    pub channel: Channel,
    pub buffer: SeriesBuffer,
}

pub struct ChannelRegistry {
    series: Vec<Series>,
    index: HashMap<ChannelId, usize>,
    max_points: usize,
}

impl ChannelRegistry {
    /// Create a registry holding every fixed channel
    pub fn new(max_points: usize) -> Self {
        let mut registry = Self {
            series: Vec::new(),
            index: HashMap::new(),
            max_points,
        };
        for fixed in FixedChannel::all() {
            registry.register(Channel::fixed(fixed));
        }
        registry
    }

    /// Add a channel with a fresh buffer. Returns its series index, or `None`
    /// when the id is already taken.
    pub fn register(&mut self, channel: Channel) -> Option<usize> {
        if self.index.contains_key(&channel.id) {
            return None;
        }
        let idx = self.series.len();
        self.index.insert(channel.id.clone(), idx);
        self.series.push(Series {
            channel,
            buffer: SeriesBuffer::new(self.max_points),
        });
        Some(idx)
    }

    /// Append a sample to the channel's buffer. Unknown ids are ignored.
    pub fn push(&mut self, id: &ChannelId, time: Timestamp, value: f64) -> bool {
        match self.index.get(id) {
            Some(&idx) => {
                self.series[idx].buffer.append(time, value);
                true
            }
            None => false,
        }
    }

    pub fn series_index(&self, id: &ChannelId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &ChannelId) -> Option<&Series> {
        self.index.get(id).map(|&idx| &self.series[idx])
    }

    /// Rename a channel in place. Returns true when the label changed.
    pub fn set_label(&mut self, id: &ChannelId, label: &str) -> bool {
        let Some(&idx) = self.index.get(id) else {
            return false;
        };
        let channel = &mut self.series[idx].channel;
        if channel.label == label {
            return false;
        }
        channel.label = label.to_string();
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Series> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.series.iter().any(|s| s.buffer.has_pending())
    }

    /// Drain every pending queue, yielding `(series index, points)` for the
    /// channels that had data
    pub fn drain_pending(&mut self) -> Vec<(usize, Vec<Point>)> {
        self.series
            .iter_mut()
            .enumerate()
            .filter(|(_, s)| s.buffer.has_pending())
            .map(|(idx, s)| (idx, s.buffer.drain_pending()))
            .collect()
    }

    pub fn clear_pending(&mut self) {
        for series in self.series.iter_mut() {
            series.buffer.clear_pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_fixed_channels_in_series_order() {
        let registry = ChannelRegistry::new(10);
        assert_eq!(registry.len(), 10);

        let keys: Vec<&str> = registry.iter().map(|s| s.channel.id.as_str()).collect();
        assert_eq!(
            keys,
            vec!["flame", "dhwMode", "chMode", "mod", "ctrlSp", "boiler", "return", "roomSp", "room", "outside"]
        );
        assert_eq!(registry.series_index(&FixedChannel::Modulation.id()), Some(3));
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let mut registry = ChannelRegistry::new(10);
        let channel = Channel {
            id: ChannelId::new("sensor_0"),
            label: "Sensor 1".to_string(),
            panel: Panel::Temperature,
            color: ColorKey::Sensor(0),
        };

        assert_eq!(registry.register(channel.clone()), Some(10));
        assert_eq!(registry.register(channel), None);
        assert_eq!(registry.len(), 11);
    }

    #[test]
    fn test_push_routes_by_id() {
        let mut registry = ChannelRegistry::new(10);
        assert!(registry.push(&FixedChannel::Boiler.id(), at(0), 55.0));
        assert!(!registry.push(&ChannelId::new("nope"), at(0), 1.0));

        let boiler = registry.get(&FixedChannel::Boiler.id()).unwrap();
        assert_eq!(boiler.buffer.len(), 1);
        assert!(registry.has_pending());
    }

    #[test]
    fn test_drain_pending_reports_series_index() {
        let mut registry = ChannelRegistry::new(10);
        registry.push(&FixedChannel::Room.id(), at(0), 20.5);
        registry.push(&FixedChannel::Room.id(), at(1), 20.6);

        let drained = registry.drain_pending();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, 8);
        assert_eq!(drained[0].1.len(), 2);
        assert!(!registry.has_pending());
    }

    #[test]
    fn test_set_label() {
        let mut registry = ChannelRegistry::new(10);
        let id = FixedChannel::Outside.id();
        assert!(!registry.set_label(&id, "Outside Temp"));
        assert!(registry.set_label(&id, "Garden"));
        assert_eq!(registry.get(&id).unwrap().channel.label, "Garden");
    }

    #[test]
    fn test_valid_ranges() {
        assert!(FixedChannel::Modulation.valid_range().contains(&55.0));
        assert!(!FixedChannel::Modulation.valid_range().contains(&150.0));
        assert!(FixedChannel::Boiler.valid_range().contains(&-50.0));
        assert!(!FixedChannel::Boiler.valid_range().contains(&150.5));
    }
}
