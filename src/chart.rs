//! # Chart Boundary Module
//!
//! Everything the engine tells the external rendering engine.
//!
//! ## Key Types
//! - `ChartConfig`: Declarative full configuration (panels, axes, legend,
//!   series with colors, history and connectivity mark lines)
//! - `ChartSurface`: A live chart instance accepting full configurations,
//!   incremental appends and time-axis bounds
//! - `ChartFactory`: Creates surfaces for a theme (initialisation and theme
//!   switches)
//! - `Theme`: Light/dark palettes
//!
//! ## Layout
//! Five stacked panels share one time axis: flame, hot water and heating as
//! On/Off step traces, modulation in percent, and all temperatures (including
//! discovered sensors) in the bottom panel.

use crate::channels::{ChannelId, ChannelRegistry, ColorKey, FixedChannel, Panel};
use crate::error::ChartError;
use crate::markers::{ConnectivityMarker, MarkerKind};
use crate::timeseries::{Point, Timestamp};
use serde::{Deserialize, Serialize};

pub const SENSOR_PALETTE_SIZE: usize = 16;

const SENSOR_PALETTE_LIGHT: [&str; SENSOR_PALETTE_SIZE] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
    "#F8B195", "#C06C84", "#6C5B7B", "#355C7D", "#2A9D8F", "#E76F51", "#F4A261", "#E9C46A",
];

const SENSOR_PALETTE_DARK: [&str; SENSOR_PALETTE_SIZE] = [
    "#FF8787", "#5FE3D9", "#5BC8E8", "#FFB59A", "#ADE8D8", "#FFE66D", "#D1A5E6", "#A0D6F2",
    "#FFD1B5", "#D688A4", "#8677A1", "#4A7BA7", "#3EBFB0", "#FF8C71", "#FFB881", "#FFD78A",
];

const DISCONNECT_COLOR: &str = "#ff4444";
const RECONNECT_COLOR: &str = "#44ff44";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn color(&self, key: ColorKey) -> &'static str {
        match key {
            ColorKey::Fixed(channel) => self.fixed_color(channel),
            ColorKey::Sensor(idx) => {
                let palette = match self {
                    Theme::Light => &SENSOR_PALETTE_LIGHT,
                    Theme::Dark => &SENSOR_PALETTE_DARK,
                };
                palette[idx % SENSOR_PALETTE_SIZE]
            }
        }
    }

    fn fixed_color(&self, channel: FixedChannel) -> &'static str {
        match (self, channel) {
            (Theme::Light, FixedChannel::Flame) => "red",
            (Theme::Light, FixedChannel::DhwMode) => "blue",
            (Theme::Light, FixedChannel::ChMode) => "green",
            (Theme::Light, FixedChannel::Modulation) => "black",
            (Theme::Light, FixedChannel::ControlSetpoint) => "grey",
            (Theme::Light, FixedChannel::Boiler) => "red",
            (Theme::Light, FixedChannel::Return) => "blue",
            (Theme::Light, FixedChannel::RoomSetpoint) => "darkcyan",
            (Theme::Light, FixedChannel::Room) => "magenta",
            (Theme::Light, FixedChannel::Outside) => "green",
            (Theme::Dark, FixedChannel::Flame) => "#ff4d4f",
            (Theme::Dark, FixedChannel::DhwMode) => "#40a9ff",
            (Theme::Dark, FixedChannel::ChMode) => "#73d13d",
            (Theme::Dark, FixedChannel::Modulation) => "#ffffff",
            (Theme::Dark, FixedChannel::ControlSetpoint) => "#bfbfbf",
            (Theme::Dark, FixedChannel::Boiler) => "#ff7875",
            (Theme::Dark, FixedChannel::Return) => "#69c0ff",
            (Theme::Dark, FixedChannel::RoomSetpoint) => "cyan",
            (Theme::Dark, FixedChannel::Room) => "#ff85c0",
            (Theme::Dark, FixedChannel::Outside) => "#95de64",
        }
    }

    /// Background used when capturing an image of the chart
    pub fn background(&self) -> &'static str {
        match self {
            Theme::Light => "#fff",
            Theme::Dark => "#1e1e1e",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAxis {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub interval: Option<f64>,
    /// Label format, `{value}` is substituted by the renderer
    pub label_format: &'static str,
}

impl ValueAxis {
    fn for_panel(panel: Panel) -> Self {
        match panel {
            Panel::Flame | Panel::HotWater | Panel::Heating => ValueAxis {
                min: Some(0.0),
                max: Some(1.2),
                interval: Some(1.0),
                label_format: "on_off",
            },
            Panel::Modulation => ValueAxis {
                min: Some(0.0),
                max: Some(100.0),
                interval: None,
                label_format: "{value}%",
            },
            Panel::Temperature => ValueAxis {
                min: None,
                max: None,
                interval: None,
                label_format: "{value}°C",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelConfig {
    pub panel: Panel,
    pub index: usize,
    pub title: &'static str,
    pub y_axis: ValueAxis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeAxis {
    pub panel: usize,
    pub show_labels: bool,
    /// Only the labelled bottom axis is bounded in a full configuration;
    /// render ticks move every axis
    pub min: Option<Timestamp>,
}

/// Lower bound update for one time axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBound {
    pub axis: usize,
    pub min: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkLine {
    pub time: Timestamp,
    pub kind: MarkerKind,
    pub color: &'static str,
    pub dashed: bool,
}

impl From<&ConnectivityMarker> for MarkLine {
    fn from(marker: &ConnectivityMarker) -> Self {
        MarkLine {
            time: marker.time,
            kind: marker.kind,
            color: match marker.kind {
                MarkerKind::Disconnect => DISCONNECT_COLOR,
                MarkerKind::Reconnect => RECONNECT_COLOR,
            },
            dashed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesConfig {
    pub channel: ChannelId,
    pub name: String,
    pub panel: usize,
    pub color: &'static str,
    pub step: bool,
    pub area_opacity: Option<f32>,
    pub data: Vec<Point>,
    pub mark_lines: Vec<MarkLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    pub theme: Theme,
    pub panels: Vec<PanelConfig>,
    /// Labels shown in the temperature panel legend
    pub legend: Vec<String>,
    pub x_axes: Vec<TimeAxis>,
    pub series: Vec<SeriesConfig>,
}

impl ChartConfig {
    /// Build the full configuration from the current channel state.
    ///
    /// Series follow registry order, so position in `series` is the stable
    /// series index used by incremental appends.
    pub fn build(
        registry: &ChannelRegistry,
        markers: &[ConnectivityMarker],
        theme: Theme,
        window_start: Timestamp,
    ) -> Self {
        let mark_lines: Vec<MarkLine> = markers.iter().map(MarkLine::from).collect();
        let mut panels_with_markers = Vec::new();

        let series = registry
            .iter()
            .map(|s| {
                let panel = s.channel.panel;
                let digital = panel.is_digital();
                // One copy of the markers per panel, on its first series
                let lines = if panels_with_markers.contains(&panel) {
                    Vec::new()
                } else {
                    panels_with_markers.push(panel);
                    mark_lines.clone()
                };
                SeriesConfig {
                    channel: s.channel.id.clone(),
                    name: s.channel.label.clone(),
                    panel: panel.index(),
                    color: theme.color(s.channel.color),
                    step: digital,
                    area_opacity: digital.then_some(0.3),
                    data: s.buffer.points().copied().collect(),
                    mark_lines: lines,
                }
            })
            .collect();

        let legend = registry
            .iter()
            .filter(|s| s.channel.panel == Panel::Temperature)
            .map(|s| s.channel.label.clone())
            .collect();

        let panels = Panel::all()
            .into_iter()
            .map(|panel| PanelConfig {
                panel,
                index: panel.index(),
                title: panel.title(),
                y_axis: ValueAxis::for_panel(panel),
            })
            .collect();

        let last = Panel::all().len() - 1;
        let x_axes = (0..=last)
            .map(|idx| TimeAxis {
                panel: idx,
                show_labels: idx == last,
                min: (idx == last).then_some(window_start),
            })
            .collect();

        Self {
            theme,
            panels,
            legend,
            x_axes,
            series,
        }
    }
}

/// One bound per time axis, all set to `min`
pub fn axis_bounds(min: Timestamp) -> Vec<AxisBound> {
    (0..Panel::all().len())
        .map(|axis| AxisBound { axis, min })
        .collect()
}

/// A live chart owned by the external rendering engine
pub trait ChartSurface {
    /// Replace the whole configuration, including all history
    fn set_option(&mut self, config: &ChartConfig);

    /// Append points to one series, addressed by stable series index
    fn append_data(&mut self, series_index: usize, points: &[Point]);

    /// Move the lower bound of the time axes
    fn set_x_axes(&mut self, bounds: &[AxisBound]);

    /// Render the chart to PNG bytes
    fn capture_png(&mut self, background: &str) -> Result<Vec<u8>, ChartError>;

    fn dispose(&mut self);
}

pub trait ChartFactory {
    fn create(&mut self, theme: Theme) -> Result<Box<dyn ChartSurface>, ChartError>;
}
