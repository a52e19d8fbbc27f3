//! # Connectivity Marker Log
//!
//! Timestamped disconnect/reconnect events shown as vertical annotation lines.
//! Repeated events of the same kind are kept as separate markers. Markers
//! older than 24 hours are purged on every append.

use crate::timeseries::Timestamp;
use serde::Serialize;

pub fn retention() -> chrono::Duration {
    chrono::Duration::hours(24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Disconnect,
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityMarker {
    pub time: Timestamp,
    pub kind: MarkerKind,
}

#[derive(Debug, Default)]
pub struct ConnectivityEventLog {
    markers: Vec<ConnectivityMarker>,
}

impl ConnectivityEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_disconnect(&mut self, now: Timestamp) {
        log::info!("Disconnect marker added at {}", now.to_rfc3339());
        self.append(now, MarkerKind::Disconnect);
    }

    pub fn record_reconnect(&mut self, now: Timestamp) {
        log::info!("Connected marker added at {}", now.to_rfc3339());
        self.append(now, MarkerKind::Reconnect);
    }

    fn append(&mut self, now: Timestamp, kind: MarkerKind) {
        self.markers.push(ConnectivityMarker { time: now, kind });
        let cutoff = now - retention();
        self.markers.retain(|m| m.time > cutoff);
    }

    pub fn markers(&self) -> &[ConnectivityMarker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
