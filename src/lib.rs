//! SNCL Expediter Library
//!
//! A Rust library that resolves "what seismic channel data exists, where, and
//! how to fetch it" for quality-metric pipelines evaluating seismic sensor
//! networks.
//!
//! This library provides tools for:
//! - Matching Network.Station.Location.Channel identifiers against wildcard
//!   patterns with a configurable field order
//! - Scanning local day-file archives and reporting per-channel coverage
//! - Merging channel-epoch metadata from local archives, local inventory
//!   files, and remote metadata services into one normalized table
//! - Geographic-radius and time-window filtering of channel epochs
//! - Fetching waveforms over single- or multi-day windows, stitched across
//!   day boundaries, sliced to the requested window, and annotated with
//!   state-of-health flag counts and instrument metadata

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod archive_scanner;
        pub mod fetch;
        pub mod geodetic;
        pub mod inventory;
        pub mod metrics_registry;
        pub mod resolver;
        pub mod sncl;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{
    AvailabilityRecord, AvailabilityTable, ChannelIdentifier, RequestWindow, Stream,
};
pub use app::services::resolver::Expediter;
pub use config::Config;

/// Result type alias for the expediter
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for availability resolution and waveform fetching
///
/// The taxonomy matters to callers: `Configuration` is fatal to a run,
/// `NoData` and `MultipleEpochs` are per-channel conditions a metric loop
/// recovers from, and `TransientSource` marks a failing backend that must not
/// abort the remaining channels of a batch.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid configuration (malformed pattern, bad field order, unset source)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No data exists for the requested channels/window; recoverable per channel
    #[error("No data available: {context}")]
    NoData { context: String },

    /// More than one metadata epoch overlaps the requested window
    #[error("{count} metadata epochs overlap the requested window for {sncl_id}")]
    MultipleEpochs { sncl_id: String, count: usize },

    /// A backend failed transiently (network, malformed response, decode)
    #[error("Source error: {message}")]
    TransientSource {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Requested window is empty or inverted
    #[error("Invalid request window: start {start} is not before end {end}")]
    InvalidWindow { start: String, end: String },

    /// Waveform container could not be decoded
    #[error("Decode error for {sncl_id}: {reason}")]
    Decode { sncl_id: String, reason: String },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error
    #[error("Directory traversal error: {message}")]
    DirectoryTraversal {
        message: String,
        #[source]
        source: walkdir::Error,
    },

    /// Date/time parsing error
    #[error("Date/time parsing error: {message}")]
    DateTimeParsing {
        message: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a no-data error with context
    pub fn no_data(context: impl Into<String>) -> Self {
        Self::NoData {
            context: context.into(),
        }
    }

    /// Create a multiple-epochs error
    pub fn multiple_epochs(sncl_id: impl Into<String>, count: usize) -> Self {
        Self::MultipleEpochs {
            sncl_id: sncl_id.into(),
            count,
        }
    }

    /// Create a transient source error with an underlying cause
    pub fn transient(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TransientSource {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transient source error with a message only
    pub fn transient_msg(message: impl Into<String>) -> Self {
        Self::TransientSource {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error
    pub fn decode(sncl_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            sncl_id: sncl_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// True when the caller can skip the channel and continue the batch
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoData { .. }
                | Self::MultipleEpochs { .. }
                | Self::TransientSource { .. }
                | Self::Decode { .. }
        )
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(error: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: "Directory traversal failed".to_string(),
            source: error,
        }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(error: chrono::ParseError) -> Self {
        Self::DateTimeParsing {
            message: "Date/time parsing failed".to_string(),
            source: error,
        }
    }
}

impl From<regex::Error> for Error {
    fn from(error: regex::Error) -> Self {
        Self::Configuration {
            message: format!("Pattern could not be compiled: {error}"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::TransientSource {
            message: "HTTP request failed".to_string(),
            source: Some(Box::new(error)),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::TransientSource {
            message: "Inventory parsing failed".to_string(),
            source: Some(Box::new(error)),
        }
    }
}
