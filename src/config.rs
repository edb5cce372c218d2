//! Configuration surface for the expediter
//!
//! Covers the data-source selector, the SNCL field-order string, slicing and
//! epoch-ambiguity policy defaults, and the local-archive duplicate-file
//! policy. Validation happens at load, not at call time.

use crate::app::services::sncl::SnclOrder;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Which backend answers availability queries
///
/// Exactly one source is active per resolver; mixing sources within one
/// query is not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    /// A local day-file archive, optionally paired with a station inventory
    /// file supplying coordinates and instrument response
    LocalArchive {
        root: PathBuf,
        inventory: Option<PathBuf>,
    },
    /// A local station inventory file alone (no waveform files)
    InventoryFile { path: PathBuf },
    /// A remote metadata service endpoint
    RemoteMetadata {
        endpoint: String,
        style: ServiceStyle,
    },
}

impl DataSource {
    /// True when availability can be built once and re-filtered per query
    ///
    /// Local sources are not time-windowed at the backend, so the merged
    /// table is built a single time per process.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::RemoteMetadata { .. })
    }
}

/// Request/response shape variant of the remote metadata service
///
/// Classic station metadata and the array-style deployment service carry
/// the same channel-epoch fields under slightly different shapes; both are
/// normalized into `AvailabilityRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStyle {
    Station,
    Array,
}

/// Tie-break policy when multiple archive files cover the same channel+day
///
/// The deterministic pick plus a warning is deliberate; which file wins is
/// configurable because neither choice is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    KeepFirst,
    KeepLast,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self::KeepFirst
    }
}

/// Expediter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active availability backend
    pub source: DataSource,

    /// Remote waveform service endpoint, when waveforms are not local
    pub waveform_endpoint: Option<String>,

    /// SNCL field order for parsing patterns, e.g. "N.S.L.C"
    pub sncl_order: String,

    /// Whether a sample landing exactly on the window end is kept by default
    pub inclusive_end: bool,

    /// Whether fetches tolerate more than one metadata epoch overlapping the
    /// requested window by default
    pub ignore_epoch_ambiguity: bool,

    /// Local-archive duplicate-file tie-break
    pub duplicate_policy: DuplicatePolicy,

    /// Preferred waveform quality code
    pub quality_code: Option<char>,
}

impl Config {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            waveform_endpoint: None,
            sncl_order: crate::constants::DEFAULT_SNCL_ORDER.to_string(),
            inclusive_end: false,
            ignore_epoch_ambiguity: false,
            duplicate_policy: DuplicatePolicy::default(),
            quality_code: None,
        }
    }

    /// Parse the configured SNCL field order
    pub fn order(&self) -> Result<SnclOrder> {
        SnclOrder::parse(&self.sncl_order)
    }

    /// Validate the configuration at load time
    ///
    /// Unreachable or unset sources are configuration errors, fatal to the
    /// run; they are never retried.
    pub fn validate(&self) -> Result<()> {
        self.order()?;

        match &self.source {
            DataSource::LocalArchive { root, inventory } => {
                if !root.is_dir() {
                    return Err(Error::configuration(format!(
                        "archive root is not a directory: {}",
                        root.display()
                    )));
                }
                if let Some(path) = inventory {
                    if !path.is_file() {
                        return Err(Error::configuration(format!(
                            "inventory file does not exist: {}",
                            path.display()
                        )));
                    }
                }
            }
            DataSource::InventoryFile { path } => {
                if !path.is_file() {
                    return Err(Error::configuration(format!(
                        "inventory file does not exist: {}",
                        path.display()
                    )));
                }
            }
            DataSource::RemoteMetadata { endpoint, .. } => {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    return Err(Error::configuration(format!(
                        "metadata endpoint is not an http(s) URL: {endpoint}"
                    )));
                }
            }
        }

        if let Some(endpoint) = &self.waveform_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(Error::configuration(format!(
                    "waveform endpoint is not an http(s) URL: {endpoint}"
                )));
            }
        }

        debug!("configuration validated: source {:?}", self.source);
        Ok(())
    }
}
