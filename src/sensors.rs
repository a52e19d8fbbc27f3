//! # Temperature Sensor Discovery Module
//!
//! Registers one-wire temperature sensors as they appear in device snapshots
//! and keeps their display labels current.
//!
//! ## Registration
//! Each new sensor address gets the next sequential `sensor_N` channel on the
//! temperature panel and the `N % 16` palette slot. The mapping is permanent:
//! addresses are never unregistered and channel ids never reused, so only
//! the label of an existing sensor can change.
//!
//! ## Label Resolution
//! First non-empty result wins:
//! 1. User label from the external label cache
//! 2. `<address>_label` published in the snapshot
//! 3. `Sensor N (<address>)`

use crate::channels::{Channel, ChannelId, ChannelRegistry, ColorKey, Panel, TEMPERATURE_RANGE};
use crate::chart::SENSOR_PALETTE_SIZE;
use crate::record::DeviceSnapshot;
use crate::timeseries::Timestamp;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Far above the number of sensors a one-wire bus can carry
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Externally maintained address → label lookup
pub trait LabelSource {
    fn cached_label(&self, address: &str) -> Option<String>;
}

/// No user labels at all
pub struct NoLabels;

impl LabelSource for NoLabels {
    fn cached_label(&self, _address: &str) -> Option<String> {
        None
    }
}

/// Bounded cache of user-assigned sensor labels.
///
/// Past its capacity the least recently written label is evicted, and a
/// sensor whose label was evicted keeps the label it already has.
pub struct LabelCache {
    entries: LruCache<String, String>,
}

impl Default for LabelCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl LabelCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn insert(&mut self, address: &str, label: &str) {
        self.entries.put(address.to_string(), label.to_string());
    }

    pub fn remove(&mut self, address: &str) {
        self.entries.pop(address);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LabelSource for LabelCache {
    fn cached_label(&self, address: &str) -> Option<String> {
        let label = self.entries.peek(address)?.trim();
        (!label.is_empty()).then(|| label.to_string())
    }
}

/// Inputs available to a label resolver
pub struct LabelContext<'a> {
    pub address: &'a str,
    pub index: usize,
    pub snapshot: Option<&'a DeviceSnapshot>,
    pub cache: &'a dyn LabelSource,
}

type Resolver = fn(&LabelContext<'_>) -> Option<String>;

/// Resolution order, highest priority first
const RESOLVERS: [Resolver; 2] = [cache_label, snapshot_label];

fn cache_label(ctx: &LabelContext<'_>) -> Option<String> {
    ctx.cache.cached_label(ctx.address)
}

fn snapshot_label(ctx: &LabelContext<'_>) -> Option<String> {
    ctx.snapshot?.label_for(ctx.address).map(str::to_string)
}

pub fn default_label(address: &str, index: usize) -> String {
    format!("Sensor {} ({})", index + 1, address)
}

pub fn resolve_label(ctx: &LabelContext<'_>) -> String {
    RESOLVERS
        .iter()
        .find_map(|resolve| resolve(ctx))
        .unwrap_or_else(|| default_label(ctx.address, ctx.index))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorRegistration {
    pub address: String,
    pub channel: ChannelId,
    pub index: usize,
    pub label: String,
}

/// Result of one snapshot observation
#[derive(Debug, Default, PartialEq)]
pub struct Discovery {
    /// Labels of sensors registered by this call
    pub added: Vec<String>,
    /// Number of existing sensors whose label changed
    pub relabelled: usize,
}

impl Discovery {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || self.relabelled > 0
    }
}

#[derive(Default)]
pub struct SensorRegistry {
    sensors: Vec<SensorRegistration>,
    by_address: HashMap<String, usize>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&SensorRegistration> {
        self.by_address.get(address).map(|&idx| &self.sensors[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SensorRegistration> {
        self.sensors.iter()
    }

    /// Register unseen temperature sensors and refresh labels of known ones
    pub fn observe_snapshot(
        &mut self,
        snapshot: &DeviceSnapshot,
        cache: &dyn LabelSource,
        channels: &mut ChannelRegistry,
    ) -> Discovery {
        let mut discovery = Discovery::default();
        if snapshot.sensor_count() == 0 {
            return discovery;
        }

        for address in snapshot.temperature_sensors() {
            let known = self.by_address.get(address).copied();
            match known {
                Some(idx) => {
                    let sensor = &mut self.sensors[idx];
                    let label = resolve_label(&LabelContext {
                        address,
                        index: sensor.index,
                        snapshot: Some(snapshot),
                        cache,
                    });
                    if sensor.label != label {
                        log::info!("Updated sensor label: {} (address {})", label, address);
                        channels.set_label(&sensor.channel, &label);
                        sensor.label = label;
                        discovery.relabelled += 1;
                    }
                }
                None => {
                    if let Some(label) = self.register(address, snapshot, cache, channels) {
                        discovery.added.push(label);
                    }
                }
            }
        }

        if !discovery.added.is_empty() {
            log::info!("Added {} new temperature sensor(s) to graph", discovery.added.len());
        }
        discovery
    }

    fn register(
        &mut self,
        address: &str,
        snapshot: &DeviceSnapshot,
        cache: &dyn LabelSource,
        channels: &mut ChannelRegistry,
    ) -> Option<String> {
        let index = self.sensors.len();
        let id = ChannelId::new(format!("sensor_{}", index));
        let label = resolve_label(&LabelContext {
            address,
            index,
            snapshot: Some(snapshot),
            cache,
        });

        let channel = Channel {
            id: id.clone(),
            label: label.clone(),
            panel: Panel::Temperature,
            color: ColorKey::Sensor(index % SENSOR_PALETTE_SIZE),
        };
        if channels.register(channel).is_none() {
            log::warn!("Channel id {} already taken, skipping sensor {}", id, address);
            return None;
        }

        log::info!("Registered temperature sensor: {} (address {})", label, address);
        self.by_address.insert(address.to_string(), index);
        self.sensors.push(SensorRegistration {
            address: address.to_string(),
            channel: id,
            index,
            label: label.clone(),
        });
        Some(label)
    }

    /// Push the current reading of every registered sensor present in the
    /// snapshot. Returns the number of samples appended.
    pub fn record_readings(
        &self,
        snapshot: &DeviceSnapshot,
        now: Timestamp,
        channels: &mut ChannelRegistry,
    ) -> usize {
        self.sensors
            .iter()
            .filter_map(|sensor| {
                snapshot
                    .reading(&sensor.address)
                    .filter(|t| TEMPERATURE_RANGE.contains(t))
                    .map(|t| (sensor, t))
            })
            .filter(|(sensor, t)| channels.push(&sensor.channel, now, *t))
            .count()
    }

    /// Re-apply cached labels only. Returns true when any label changed.
    pub fn refresh_labels(&mut self, cache: &dyn LabelSource, channels: &mut ChannelRegistry) -> bool {
        let mut changed = false;
        for sensor in self.sensors.iter_mut() {
            if let Some(label) = cache.cached_label(&sensor.address) {
                if sensor.label != label {
                    channels.set_label(&sensor.channel, &label);
                    sensor.label = label;
                    changed = true;
                }
            }
        }
        if changed {
            log::info!("Refreshed sensor labels from cache");
        }
        changed
    }
}
