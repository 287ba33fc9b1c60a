//! Recorder configuration
//!
//! Every field has a default, so an empty file (or no file) yields a working
//! recorder on UDP port 5300. Files are YAML:
//!
//! ```yaml
//! port: 5300
//! min_write_interval_ms: 100
//! output_dir: Telemetry
//! car_names: RepositoryCSV/CarOrdinal.csv
//! track_names: RepositoryCSV/TrackOrdinal.csv
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::packet::{NEUTRAL_GEAR, PACKET_LEN};
use crate::{Result, TelemetryError};

/// Default UDP port the simulator sends to.
pub const DEFAULT_PORT: u16 = 5300;

/// Settings for the UDP listener, gate and output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderConfig {
    /// Local address to bind
    pub bind_address: IpAddr,
    /// Local UDP port; 0 lets the OS choose
    pub port: u16,
    /// Size of the datagram receive buffer
    pub receive_buffer_size: usize,
    /// Minimum time between persisted records
    pub min_write_interval_ms: u64,
    /// Records slower than this (m/s) are dropped
    pub min_speed: f32,
    /// Gear value treated as neutral/park
    pub excluded_gear: u8,
    /// Directory receiving session rows and summaries
    pub output_dir: PathBuf,
    /// File name prefix for session files
    pub file_prefix: String,
    /// Two-column CSV of car ordinals to names
    pub car_names: Option<PathBuf>,
    /// Two-column CSV of track ordinals to names
    pub track_names: Option<PathBuf>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            receive_buffer_size: 1024,
            min_write_interval_ms: 100,
            min_speed: 0.5,
            excluded_gear: NEUTRAL_GEAR,
            output_dir: PathBuf::from("Telemetry"),
            file_prefix: "forza_telemetry".to_string(),
            car_names: None,
            track_names: None,
        }
    }
}

impl RecorderConfig {
    /// Load and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;

        let config = Self::from_yaml(&text).map_err(|e| match e {
            TelemetryError::Config { details, .. } => {
                TelemetryError::config(Some(path.to_path_buf()), details)
            }
            other => other,
        })?;

        debug!(path = %path.display(), ?config, "Loaded recorder configuration");
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(text).map_err(|e| TelemetryError::config(None, e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the recorder unusable.
    pub fn validate(&self) -> Result<()> {
        if self.receive_buffer_size < PACKET_LEN {
            return Err(TelemetryError::config(
                None,
                format!(
                    "receive_buffer_size {} is smaller than the {PACKET_LEN}-byte packet",
                    self.receive_buffer_size
                ),
            ));
        }

        if !self.min_speed.is_finite() || self.min_speed < 0.0 {
            return Err(TelemetryError::config(
                None,
                format!("min_speed must be a non-negative number, got {}", self.min_speed),
            ));
        }

        if self.file_prefix.trim().is_empty() {
            return Err(TelemetryError::config(None, "file_prefix cannot be empty"));
        }

        if self.file_prefix.contains(['/', '\\']) {
            return Err(TelemetryError::config(None, "file_prefix cannot contain path separators"));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn min_write_interval(&self) -> Duration {
        Duration::from_millis(self.min_write_interval_ms)
    }

    /// Approximate accepted-record rate implied by the write interval.
    pub fn accepted_rate_hz(&self) -> f64 {
        match self.min_write_interval_ms {
            0 => f64::INFINITY,
            ms => 1000.0 / ms as f64,
        }
    }
}
