//! # Record Routing Module
//!
//! Classifies decoded gateway records by message id, extracts their values and
//! pushes them into the matching channel buffers.
//!
//! ## Decoding
//! - Id 0 (status): three booleans read from fixed positions of the slave flag
//!   string (`C` heating, `W` hot water, `F` flame)
//! - Seven analog ids map to one fixed channel each, range-checked per channel
//! - Everything else is noise and silently dropped
//!
//! Samples are stamped with the ingestion time; any timestamp inside the
//! record is ignored.

use crate::channels::{ChannelRegistry, FixedChannel};
use crate::record::LogRecord;
use crate::timeseries::Timestamp;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const STATUS_ID: u8 = 0;

/// OpenTherm data ids that feed an analog channel
const ANALOG_TABLE: [(u8, FixedChannel); 7] = [
    (1, FixedChannel::ControlSetpoint),
    (16, FixedChannel::RoomSetpoint),
    (17, FixedChannel::Modulation),
    (24, FixedChannel::Room),
    (25, FixedChannel::Boiler),
    (27, FixedChannel::Outside),
    (28, FixedChannel::Return),
];

static SLAVE_FLAGS_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Slave\s*\[([^\]]{1,16})\]").expect("valid slave flag pattern"));

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub heating: bool,
    pub hot_water: bool,
    pub flame: bool,
}

impl StatusFlags {
    /// Parse a slave flag string such as `"-CWF-2-D"`
    pub fn parse(flags: &str) -> Option<Self> {
        let bytes = flags.as_bytes();
        if bytes.len() < 4 {
            return None;
        }
        Some(Self {
            heating: bytes[1] == b'C',
            hot_water: bytes[2] == b'W',
            flame: bytes[3] == b'F',
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    Status(StatusFlags),
    Analog { channel: FixedChannel, value: f64 },
}

impl Decoded {
    /// (channel, value) pairs this record contributes
    pub fn samples(&self) -> Vec<(FixedChannel, f64)> {
        match *self {
            Decoded::Status(flags) => vec![
                (FixedChannel::Flame, bool_value(flags.flame)),
                (FixedChannel::DhwMode, bool_value(flags.hot_water)),
                (FixedChannel::ChMode, bool_value(flags.heating)),
            ],
            Decoded::Analog { channel, value } => vec![(channel, value)],
        }
    }
}

fn bool_value(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// `parseFloat`-style extraction of the leading number in a text value
pub fn parse_leading_number(text: &str) -> Option<f64> {
    let matched = LEADING_NUMBER.find(text)?;
    matched.as_str().trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct RecordRouter {
    analog: HashMap<u8, FixedChannel>,
}

impl Default for RecordRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordRouter {
    pub fn new() -> Self {
        Self {
            analog: ANALOG_TABLE.iter().copied().collect(),
        }
    }

    /// Decode a record, or `None` when it is noise, unknown or implausible
    pub fn decode(&self, record: &LogRecord) -> Option<Decoded> {
        if !record.is_data() {
            return None;
        }
        let id = record.message_id()?;

        if id == STATUS_ID {
            return Self::status_flags(record).map(Decoded::Status);
        }

        let channel = *self.analog.get(&id)?;
        let value = record
            .numeric_value()
            .filter(|v| v.is_finite())
            .or_else(|| record.text_value().and_then(parse_leading_number))?;

        if !channel.valid_range().contains(&value) {
            log::trace!("Dropping out-of-range {} value {}", channel.key(), value);
            return None;
        }
        Some(Decoded::Analog { channel, value })
    }

    /// Structured flags first, then the legacy free-text rendering
    fn status_flags(record: &LogRecord) -> Option<StatusFlags> {
        if let Some(flags) = record.slave_flags() {
            return StatusFlags::parse(flags);
        }
        let text = record.text_value()?;
        let captures = SLAVE_FLAGS_TEXT.captures(text)?;
        StatusFlags::parse(captures.get(1)?.as_str())
    }

    /// Decode and push. Returns the number of samples appended.
    pub fn route(&self, record: &LogRecord, now: Timestamp, registry: &mut ChannelRegistry) -> usize {
        let Some(decoded) = self.decode(record) else {
            return 0;
        };
        decoded
            .samples()
            .into_iter()
            .filter(|(channel, value)| registry.push(&channel.id(), now, *value))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn record(value: Value) -> LogRecord {
        serde_json::from_value(value).unwrap()
    }

    fn now() -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn last_value(registry: &ChannelRegistry, channel: FixedChannel) -> Option<f64> {
        registry.get(&channel.id())?.buffer.last_point().map(|p| p.value)
    }

    #[test]
    fn test_status_record_pushes_three_flags() {
        let router = RecordRouter::new();
        let mut registry = ChannelRegistry::new(100);
        let status = record(json!({"id": 0, "valid": ">", "data": {"slave": "-C-F----"}}));

        assert_eq!(router.route(&status, now(), &mut registry), 3);
        assert_eq!(last_value(&registry, FixedChannel::ChMode), Some(1.0));
        assert_eq!(last_value(&registry, FixedChannel::DhwMode), Some(0.0));
        assert_eq!(last_value(&registry, FixedChannel::Flame), Some(1.0));

        let times: Vec<Timestamp> = [FixedChannel::Flame, FixedChannel::DhwMode, FixedChannel::ChMode]
            .iter()
            .map(|c| registry.get(&c.id()).unwrap().buffer.last_point().unwrap().time)
            .collect();
        assert!(times.iter().all(|t| *t == now()));
    }

    #[test]
    fn test_status_falls_back_to_text() {
        let router = RecordRouter::new();
        let status = record(json!({
            "id": "0", "valid": ">",
            "value": "Master [-------] Slave [-CW-----]"
        }));

        assert_eq!(
            router.decode(&status),
            Some(Decoded::Status(StatusFlags {
                heating: true,
                hot_water: true,
                flame: false
            }))
        );
    }

    #[test]
    fn test_status_without_flags_dropped() {
        let router = RecordRouter::new();
        assert_eq!(router.decode(&record(json!({"id": 0, "valid": ">"}))), None);
        assert_eq!(
            router.decode(&record(json!({"id": 0, "valid": ">", "data": {"slave": "-C"}}))),
            None
        );
        assert_eq!(
            router.decode(&record(json!({"id": 0, "valid": ">", "value": "no flags here"}))),
            None
        );
    }

    #[test]
    fn test_modulation_range() {
        let router = RecordRouter::new();
        let mut registry = ChannelRegistry::new(100);

        let too_high = record(json!({"id": 17, "valid": ">", "val": 150}));
        assert_eq!(router.route(&too_high, now(), &mut registry), 0);
        assert_eq!(last_value(&registry, FixedChannel::Modulation), None);

        let ok = record(json!({"id": 17, "valid": ">", "val": 55}));
        assert_eq!(router.route(&ok, now(), &mut registry), 1);
        assert_eq!(last_value(&registry, FixedChannel::Modulation), Some(55.0));
    }

    #[test]
    fn test_temperature_range_and_text_fallback() {
        let router = RecordRouter::new();
        assert_eq!(
            router.decode(&record(json!({"id": 25, "valid": ">", "value": "35.70 °C"}))),
            Some(Decoded::Analog {
                channel: FixedChannel::Boiler,
                value: 35.7
            })
        );
        assert_eq!(
            router.decode(&record(json!({"id": 27, "valid": ">", "value": "-3.5"}))),
            Some(Decoded::Analog {
                channel: FixedChannel::Outside,
                value: -3.5
            })
        );
        assert_eq!(router.decode(&record(json!({"id": 27, "valid": ">", "val": -51.0}))), None);
        assert_eq!(router.decode(&record(json!({"id": 25, "valid": ">", "value": "n/a"}))), None);
    }

    #[test]
    fn test_noise_dropped() {
        let router = RecordRouter::new();
        assert_eq!(router.decode(&record(json!({"id": 25, "valid": "E", "val": 40}))), None);
        assert_eq!(router.decode(&record(json!({"id": "x", "valid": ">", "val": 40}))), None);
        assert_eq!(router.decode(&record(json!({"id": 99, "valid": ">", "val": 40}))), None);
        assert_eq!(router.decode(&record(json!({"valid": ">", "val": 40}))), None);
    }

    #[test]
    fn test_every_analog_id_routes() {
        let router = RecordRouter::new();
        for (id, channel) in ANALOG_TABLE {
            let decoded = router.decode(&record(json!({"id": id, "valid": ">", "val": 42.0})));
            assert_eq!(decoded, Some(Decoded::Analog { channel, value: 42.0 }));
        }
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("  12.5 %"), Some(12.5));
        assert_eq!(parse_leading_number("1e2x"), Some(100.0));
        assert_eq!(parse_leading_number(".5"), Some(0.5));
        assert_eq!(parse_leading_number("abc 12"), None);
        assert_eq!(parse_leading_number(""), None);
    }
}
