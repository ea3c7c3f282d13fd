// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Configuration file types and parsing.
//!
//! JSON5 configuration format supporting comments and trailing commas.
//! All fields are optional and default to the RFC-recommended values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of per-interface filter table slots
pub const DEFAULT_FILTER_TABLE_SIZE: usize = 8;

/// Default capacity of each source-address list (0 disables source filtering)
pub const DEFAULT_MAX_MULTICAST_SOURCES: usize = 16;

/// Default Robustness Variable (RFC 3810 section 9.1)
pub const DEFAULT_ROBUSTNESS_VARIABLE: u8 = 2;

/// Default MLDv1 Unsolicited Report Interval (RFC 2710 section 7.10)
pub const DEFAULT_V1_UNSOLICITED_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Default MLDv2 Unsolicited Report Interval (RFC 3810 section 9.11)
pub const DEFAULT_V2_UNSOLICITED_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Default Older Version Querier Present Timeout
///
/// OVQPT = (Robustness Variable * Query Interval) + Query Response Interval,
/// evaluated with the RFC 3810 defaults (2 * 125s + 10s).
pub const DEFAULT_OLDER_VERSION_QUERIER_PRESENT_TIMEOUT: Duration = Duration::from_secs(260);

/// Default periodic tick interval driving the MLD timers
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Filter table and source-list sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MulticastConfig {
    /// Number of per-interface filter table slots
    #[serde(default = "default_filter_table_size")]
    pub filter_table_size: usize,

    /// Capacity of each source-address list. Zero disables source
    /// filtering entirely: source-filtered joins fail with NotImplemented
    /// and any interest degenerates to an any-source (EXCLUDE, empty) entry.
    #[serde(default = "default_max_multicast_sources")]
    pub max_multicast_sources: usize,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            filter_table_size: DEFAULT_FILTER_TABLE_SIZE,
            max_multicast_sources: DEFAULT_MAX_MULTICAST_SOURCES,
        }
    }
}

/// MLD listener timing parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MldConfig {
    /// Robustness Variable: total transmissions of each State-Change report
    #[serde(default = "default_robustness_variable")]
    pub robustness_variable: u8,

    /// MLDv1 unsolicited report interval, in milliseconds
    #[serde(default = "default_v1_unsolicited_ms")]
    pub v1_unsolicited_report_interval_ms: u64,

    /// MLDv2 unsolicited report interval, in milliseconds
    #[serde(default = "default_v2_unsolicited_ms")]
    pub v2_unsolicited_report_interval_ms: u64,

    /// Older Version Querier Present timeout, in milliseconds
    #[serde(default = "default_ovqp_ms")]
    pub older_version_querier_present_timeout_ms: u64,

    /// Periodic tick interval, in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,
}

impl Default for MldConfig {
    fn default() -> Self {
        Self {
            robustness_variable: DEFAULT_ROBUSTNESS_VARIABLE,
            v1_unsolicited_report_interval_ms: DEFAULT_V1_UNSOLICITED_REPORT_INTERVAL.as_millis()
                as u64,
            v2_unsolicited_report_interval_ms: DEFAULT_V2_UNSOLICITED_REPORT_INTERVAL.as_millis()
                as u64,
            older_version_querier_present_timeout_ms:
                DEFAULT_OLDER_VERSION_QUERIER_PRESENT_TIMEOUT.as_millis() as u64,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
        }
    }
}

impl MldConfig {
    /// MLDv1 unsolicited report interval as a Duration
    pub fn v1_unsolicited_report_interval(&self) -> Duration {
        Duration::from_millis(self.v1_unsolicited_report_interval_ms)
    }

    /// MLDv2 unsolicited report interval as a Duration
    pub fn v2_unsolicited_report_interval(&self) -> Duration {
        Duration::from_millis(self.v2_unsolicited_report_interval_ms)
    }

    /// Older Version Querier Present timeout as a Duration
    pub fn older_version_querier_present_timeout(&self) -> Duration {
        Duration::from_millis(self.older_version_querier_present_timeout_ms)
    }

    /// Periodic tick interval as a Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Complete node configuration (JSON5 file format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NodeConfig {
    /// Filter table and source-list sizing
    #[serde(default)]
    pub multicast: MulticastConfig,

    /// MLD listener timing
    #[serde(default)]
    pub mld: MldConfig,
}

/// Errors raised while loading or validating a configuration file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read {path}: {reason}")]
    IoError {
        /// Path that failed to load
        path: String,
        /// OS-level failure description
        reason: String,
    },

    /// The file contents are not valid JSON5
    #[error("parse error: {0}")]
    ParseError(String),

    /// A field value is outside its permitted range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

impl NodeConfig {
    /// Parse a JSON5 configuration string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig =
            json5::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.multicast.filter_table_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "multicast.filter_table_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.mld.robustness_variable == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mld.robustness_variable",
                reason: "must be at least 1 (RFC 3810 section 9.1)".to_string(),
            });
        }
        if self.mld.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mld.tick_interval_ms",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_filter_table_size() -> usize {
    DEFAULT_FILTER_TABLE_SIZE
}

fn default_max_multicast_sources() -> usize {
    DEFAULT_MAX_MULTICAST_SOURCES
}

fn default_robustness_variable() -> u8 {
    DEFAULT_ROBUSTNESS_VARIABLE
}

fn default_v1_unsolicited_ms() -> u64 {
    DEFAULT_V1_UNSOLICITED_REPORT_INTERVAL.as_millis() as u64
}

fn default_v2_unsolicited_ms() -> u64 {
    DEFAULT_V2_UNSOLICITED_REPORT_INTERVAL.as_millis() as u64
}

fn default_ovqp_ms() -> u64 {
    DEFAULT_OLDER_VERSION_QUERIER_PRESENT_TIMEOUT.as_millis() as u64
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}
