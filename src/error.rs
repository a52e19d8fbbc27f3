//! # Error Types Module
//!
//! Centralized error handling for the graph engine.
//! Only external-resource failures are modelled here. Malformed records and
//! out-of-range measurements are expected noise and never become errors.
//!
//! ## Error Types
//! - `ConfigError`: Configuration file I/O and parsing errors
//! - `ChartError`: Chart surface creation, capture and disposal failures
//! - `SinkError`: Save sink rejections (missing directory, write failures)
//!
//! ## Usage Examples
//! ```rust,ignore
//! // Config module uses ConfigError
//! pub fn load() -> Result<Config, ConfigError> { ... }
//!
//! // Chart factories use ChartError
//! fn create(&mut self, theme: Theme) -> Result<Box<dyn ChartSurface>, ChartError> { ... }
//!
//! // Save sinks use SinkError
//! fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError> { ... }
//! ```

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors raised by the external chart surface
#[derive(Debug, Clone, PartialEq)]
pub enum ChartError {
    /// The rendering backend could not create a surface
    CreationFailed(String),
    /// The surface cannot produce an image
    CaptureUnsupported,
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartError::CreationFailed(msg) => {
                write!(f, "Failed to create chart surface: {}", msg)
            }
            ChartError::CaptureUnsupported => {
                write!(f, "Chart surface does not support image capture")
            }
        }
    }
}

impl std::error::Error for ChartError {}

/// Errors returned by a save sink
#[derive(Debug)]
pub enum SinkError {
    /// The sink has no target directory configured
    NoTarget,
    /// The configured directory does not exist
    MissingDirectory(PathBuf),
    /// Writing the payload failed
    WriteFailed { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::NoTarget => {
                write!(f, "No save directory configured")
            }
            SinkError::MissingDirectory(path) => {
                write!(f, "Save directory {} does not exist", path.display())
            }
            SinkError::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::WriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
