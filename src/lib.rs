//! Telemetry graph engine for an OpenTherm gateway.
//!
//! Decoded gateway log records and device-state snapshots are routed into
//! bounded per-channel histories, flushed to a chart surface on a render
//! tick, and exported as forward-filled CSV or PNG captures.

pub mod channels;
pub mod chart;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod markers;
pub mod record;
pub mod router;
pub mod runtime;
pub mod scheduler;
pub mod sensors;
pub mod timeseries;
