//! # Input Record Types
//!
//! Shapes of the objects handed over by the external log decoder and the
//! device-state API. Everything is optional and loosely typed because the
//! producers are lenient; the accessors here do the tolerant extraction and
//! return `None` for anything unusable.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Marker the decoder puts in `valid` for a genuine data line
const DATA_LINE_MARKER: &str = ">";
/// Snapshot kind tag of a one-wire temperature sensor
const TEMPERATURE_SENSOR_KIND: &str = "dallas";
const SENSOR_COUNT_KEY: &str = "numberofsensors";
const LABEL_SUFFIX: &str = "_label";

/// One decoded gateway log line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub valid: Option<String>,
    /// Structured payload; status records carry `{"slave": "-CWF-2-D"}`
    #[serde(default)]
    pub data: Option<Value>,
    /// Structured numeric value
    #[serde(default)]
    pub val: Option<Value>,
    /// Free-text rendering of the value, e.g. `"35.70 °C"`
    #[serde(default)]
    pub value: Option<Value>,
}

impl LogRecord {
    /// Whether the decoder flagged this as a data line rather than noise
    pub fn is_data(&self) -> bool {
        self.valid.as_deref() == Some(DATA_LINE_MARKER)
    }

    /// Message id, accepting numbers or strings with a leading integer
    pub fn message_id(&self) -> Option<u8> {
        match self.id.as_ref()? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
                .and_then(|id| u8::try_from(id).ok()),
            Value::String(s) => leading_integer(s).and_then(|id| u8::try_from(id).ok()),
            _ => None,
        }
    }

    pub fn slave_flags(&self) -> Option<&str> {
        self.data
            .as_ref()?
            .get("slave")?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    pub fn numeric_value(&self) -> Option<f64> {
        self.val.as_ref()?.as_f64()
    }

    pub fn text_value(&self) -> Option<&str> {
        self.value.as_ref()?.as_str()
    }
}

/// Integer prefix of a string after leading whitespace, e.g. `"2 sensors"`
fn leading_integer(text: &str) -> Option<u64> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// One snapshot entry. Entries that are not objects, or whose fields have
/// unexpected types, deserialize to an empty entry instead of failing the
/// whole snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotEntry {
    pub value: Value,
    pub kind: Option<String>,
}

impl<'de> Deserialize<'de> for SnapshotEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entry = match Value::deserialize(deserializer)? {
            Value::Object(mut fields) => SnapshotEntry {
                kind: fields.get("type").and_then(Value::as_str).map(str::to_string),
                value: fields.remove("value").unwrap_or(Value::Null),
            },
            _ => SnapshotEntry::default(),
        };
        Ok(entry)
    }
}

/// Point-in-time key/value view of the device state
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DeviceSnapshot {
    entries: BTreeMap<String, SnapshotEntry>,
}

impl DeviceSnapshot {
    pub fn with_entry(mut self, key: &str, value: Value, kind: Option<&str>) -> Self {
        self.entries.insert(
            key.to_string(),
            SnapshotEntry {
                value,
                kind: kind.map(str::to_string),
            },
        );
        self
    }

    /// Declared sensor count; zero when absent or unparsable
    pub fn sensor_count(&self) -> u32 {
        match self.entries.get(SENSOR_COUNT_KEY).map(|e| &e.value) {
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map_or(0, |f| f.min(f64::from(u32::MAX)) as u32),
            Some(Value::String(s)) => leading_integer(s)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Addresses of entries tagged as temperature sensors, in key order
    pub fn temperature_sensors(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.kind.as_deref() == Some(TEMPERATURE_SENSOR_KIND))
            .map(|(k, _)| k.as_str())
    }

    /// Label published alongside a sensor as `<address>_label`
    pub fn label_for(&self, address: &str) -> Option<&str> {
        self.entries
            .get(&format!("{}{}", address, LABEL_SUFFIX))?
            .value
            .as_str()
            .filter(|s| !s.is_empty())
    }

    pub fn reading(&self, key: &str) -> Option<f64> {
        self.entries.get(key)?.value.as_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json() {
        let record: LogRecord = serde_json::from_value(json!({
            "id": 25, "valid": ">", "val": 54.3, "value": "54.30 °C"
        }))
        .unwrap();

        assert!(record.is_data());
        assert_eq!(record.message_id(), Some(25));
        assert_eq!(record.numeric_value(), Some(54.3));
        assert_eq!(record.text_value(), Some("54.30 °C"));
    }

    #[test]
    fn test_message_id_variants() {
        let with_id = |id: Value| LogRecord {
            id: Some(id),
            ..LogRecord::default()
        };
        assert_eq!(with_id(json!("17")).message_id(), Some(17));
        assert_eq!(with_id(json!(" 0 ")).message_id(), Some(0));
        assert_eq!(with_id(json!("abc")).message_id(), None);
        assert_eq!(with_id(json!(null)).message_id(), None);
        assert_eq!(with_id(json!(300)).message_id(), None);
        assert_eq!(LogRecord::default().message_id(), None);
    }

    #[test]
    fn test_invalid_marker() {
        let record = LogRecord {
            valid: Some("E".to_string()),
            ..LogRecord::default()
        };
        assert!(!record.is_data());
        assert!(!LogRecord::default().is_data());
    }

    #[test]
    fn test_slave_flags() {
        let record = LogRecord {
            data: Some(json!({"slave": "-CWF-2-D", "master": "-------"})),
            ..LogRecord::default()
        };
        assert_eq!(record.slave_flags(), Some("-CWF-2-D"));

        let empty = LogRecord {
            data: Some(json!({"slave": ""})),
            ..LogRecord::default()
        };
        assert_eq!(empty.slave_flags(), None);
    }

    #[test]
    fn test_snapshot_sensors() {
        let snapshot: DeviceSnapshot = serde_json::from_value(json!({
            "numberofsensors": {"value": "2"},
            "28ff64d1": {"value": 21.5, "type": "dallas"},
            "28ff64d1_label": {"value": "Attic"},
            "28aa0001": {"value": 19.0, "type": "dallas"},
            "boilertemp": {"value": 55.0}
        }))
        .unwrap();

        assert_eq!(snapshot.sensor_count(), 2);
        let sensors: Vec<&str> = snapshot.temperature_sensors().collect();
        assert_eq!(sensors, vec!["28aa0001", "28ff64d1"]);
        assert_eq!(snapshot.label_for("28ff64d1"), Some("Attic"));
        assert_eq!(snapshot.label_for("28aa0001"), None);
        assert_eq!(snapshot.reading("28ff64d1"), Some(21.5));
    }

    #[test]
    fn test_snapshot_without_count() {
        let snapshot = DeviceSnapshot::default().with_entry("28ff", json!(20.0), Some("dallas"));
        assert_eq!(snapshot.sensor_count(), 0);
    }

    #[test]
    fn test_snapshot_tolerates_odd_entries() {
        let snapshot: DeviceSnapshot = serde_json::from_value(json!({
            "numberofsensors": {"value": 1},
            "28ff0001": {"value": 20.0, "type": "dallas"},
            "uptime": 12345,
            "flags": {"value": 1, "type": 3},
            "hostname": "otgw"
        }))
        .unwrap();

        assert_eq!(snapshot.sensor_count(), 1);
        let sensors: Vec<&str> = snapshot.temperature_sensors().collect();
        assert_eq!(sensors, vec!["28ff0001"]);
        assert_eq!(snapshot.reading("28ff0001"), Some(20.0));
        assert_eq!(snapshot.reading("uptime"), None);
        assert_eq!(snapshot.reading("flags"), Some(1.0));
    }

    #[test]
    fn test_sensor_count_forms() {
        let count = |value: Value| {
            DeviceSnapshot::default()
                .with_entry("numberofsensors", value, None)
                .sensor_count()
        };
        assert_eq!(count(json!(2)), 2);
        assert_eq!(count(json!(2.0)), 2);
        assert_eq!(count(json!(3.7)), 3);
        assert_eq!(count(json!("2 sensors")), 2);
        assert_eq!(count(json!(" 4")), 4);
        assert_eq!(count(json!(-1)), 0);
        assert_eq!(count(json!("none")), 0);
        assert_eq!(count(json!(null)), 0);
    }
}
