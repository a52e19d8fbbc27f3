//! # Export Module
//!
//! Turns buffered history into a dense, time-aligned CSV table and hands
//! saved artifacts (CSV exports, chart captures) to a save sink chain.
//!
//! ## Forward Fill
//! Channels are sampled asynchronously, so a sample rarely shares its exact
//! timestamp with other channels. Every distinct timestamp inside the window
//! becomes a row; each cell holds the channel's most recent value at or
//! before that row, seeded from the last sample before the window. Cells stay
//! empty until a channel has produced a value.
//!
//! ## Save Chain
//! Artifacts go to the configured log directory first. When that sink rejects
//! the payload the download directory is used instead.

use crate::channels::ChannelRegistry;
use crate::error::SinkError;
use crate::timeseries::Timestamp;
use chrono::SecondsFormat;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// CSV export of buffered history
    Data,
    /// PNG capture of the chart
    Graph,
}

impl Artifact {
    fn prefix(&self) -> &'static str {
        match self {
            Artifact::Data => "otgw-data",
            Artifact::Graph => "otgw-graph",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Artifact::Data => "csv",
            Artifact::Graph => "png",
        }
    }

    /// e.g. `otgw-data-auto-2024-01-31T12-00-00.csv`
    pub fn filename(&self, auto: bool, now: Timestamp) -> String {
        format!(
            "{}{}{}.{}",
            self.prefix(),
            if auto { "-auto-" } else { "-" },
            now.format("%Y-%m-%dT%H-%M-%S"),
            self.extension()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub time: Timestamp,
    /// One cell per channel, in series order
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<ExportRow>,
}

/// Collect every channel's samples at or after `now - window` into a
/// forward-filled table
pub fn export_window(registry: &ChannelRegistry, now: Timestamp, window: chrono::Duration) -> ExportTable {
    let start = now - window;

    let mut sparse: BTreeMap<Timestamp, Vec<(usize, f64)>> = BTreeMap::new();
    let mut last_known: Vec<Option<f64>> = Vec::with_capacity(registry.len());

    for (idx, series) in registry.iter().enumerate() {
        for point in series.buffer.since(start) {
            sparse.entry(point.time).or_default().push((idx, point.value));
        }
        last_known.push(series.buffer.last_before(start).map(|p| p.value));
    }

    let rows = sparse
        .into_iter()
        .map(|(time, cells)| {
            for (idx, value) in cells {
                last_known[idx] = Some(value);
            }
            ExportRow {
                time,
                values: last_known.clone(),
            }
        })
        .collect();

    let mut headers = vec!["Timestamp".to_string()];
    headers.extend(registry.iter().map(|s| s.channel.label.clone()));

    ExportTable { headers, rows }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl ExportTable {
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        let header: Vec<String> = self.headers.iter().map(|h| csv_field(h)).collect();
        csv.push_str(&header.join(","));
        csv.push('\n');

        for row in &self.rows {
            csv.push_str(&row.time.to_rfc3339_opts(SecondsFormat::Millis, true));
            for value in &row.values {
                csv.push(',');
                if let Some(value) = value {
                    let _ = write!(csv, "{}", value);
                }
            }
            csv.push('\n');
        }
        csv
    }
}

/// Destination for saved artifacts
pub trait SaveSink {
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError>;
}

fn write_file(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError> {
    let path = dir.join(filename);
    fs::write(&path, bytes).map_err(|source| SinkError::WriteFailed {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// User-chosen log directory; rejects when unset or missing
pub struct DirectorySink {
    dir: Option<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl SaveSink for DirectorySink {
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError> {
        let dir = self.dir.as_ref().ok_or(SinkError::NoTarget)?;
        if !dir.is_dir() {
            return Err(SinkError::MissingDirectory(dir.clone()));
        }
        write_file(dir, filename, bytes)
    }
}

/// Direct-download fallback; creates its directory on demand
pub struct DownloadSink {
    dir: PathBuf,
}

impl Default for DownloadSink {
    fn default() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")))
    }
}

impl DownloadSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl SaveSink for DownloadSink {
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.dir).map_err(|source| SinkError::WriteFailed {
            path: self.dir.clone(),
            source,
        })?;
        write_file(&self.dir, filename, bytes)
    }
}

pub struct SaveChain {
    primary: Box<dyn SaveSink>,
    fallback: Box<dyn SaveSink>,
}

impl SaveChain {
    pub fn new(primary: Box<dyn SaveSink>, fallback: Box<dyn SaveSink>) -> Self {
        Self { primary, fallback }
    }

    /// Primary sink first, fallback on rejection
    pub fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError> {
        match self.primary.save(filename, bytes) {
            Ok(path) => Ok(path),
            Err(e) => {
                log::warn!("Save to log directory failed ({}), falling back to download", e);
                self.fallback.save(filename, bytes)
            }
        }
    }
}
