//! Command-line argument definitions for the SNCL expediter
//!
//! Defines the complete CLI surface using the clap derive API: the
//! availability and fetch subcommands, the data-source selector, the request
//! window, and the optional geographic-radius constraint.

use crate::app::models::RequestWindow;
use crate::app::services::geodetic::RadiusFilter;
use crate::config::{Config, DataSource, DuplicatePolicy, ServiceStyle};
use crate::constants::DEFAULT_SNCL_ORDER;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the SNCL expediter
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sncl-expediter",
    version,
    about = "Resolve seismic channel availability and fetch waveform streams",
    long_about = "Answers \"what channel data exists, where, and how do I fetch it\" for \
                  seismic quality-metric workflows. Matches Network.Station.Location.Channel \
                  patterns against a local day-file archive, a station inventory file, or a \
                  remote metadata service, and fetches waveforms stitched across day \
                  boundaries and sliced to the requested window."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Resolve channel availability for one or more SNCL patterns
    Availability(AvailabilityArgs),
    /// Fetch waveform streams for every channel matching the patterns
    Fetch(FetchArgs),
}

impl Args {
    /// Get the command if one was specified
    pub fn get_command(&self) -> Commands {
        self.command
            .clone()
            .expect("Command should be present when get_command() is called")
    }
}

/// Where channel epochs come from; exactly one backend must be selected
#[derive(Debug, Clone, Parser)]
pub struct SourceArgs {
    /// Root directory of a local day-file archive
    ///
    /// Files are discovered recursively by the NET.STA.LOC.CHA.YYYY.DDD and
    /// NET.STA.LOC.CHA.D.YYYY.DDD naming conventions, with an optional
    /// trailing quality letter.
    #[arg(long = "archive", value_name = "DIR", help = "Local day-file archive root")]
    pub archive: Option<PathBuf>,

    /// Station inventory file (pipe-delimited channel epochs)
    ///
    /// Alongside --archive it supplies coordinates and instrument response
    /// for the scanned channels; alone it becomes the availability source.
    #[arg(
        long = "inventory",
        value_name = "FILE",
        help = "Station inventory file with channel epochs"
    )]
    pub inventory: Option<PathBuf>,

    /// Remote metadata service endpoint
    #[arg(
        long = "metadata-url",
        value_name = "URL",
        conflicts_with_all = ["archive", "inventory"],
        help = "Remote metadata service endpoint"
    )]
    pub metadata_url: Option<String>,

    /// Shape variant of the remote metadata service
    #[arg(
        long = "service-style",
        value_enum,
        default_value = "station",
        help = "Remote metadata service style"
    )]
    pub service_style: ServiceStyleArg,

    /// Remote waveform service endpoint
    ///
    /// Required for fetching when no local archive is configured.
    #[arg(
        long = "waveform-url",
        value_name = "URL",
        help = "Remote waveform service endpoint"
    )]
    pub waveform_url: Option<String>,

    /// SNCL field order used when parsing patterns
    ///
    /// Four dot-separated letters naming the Network, Station, Location, and
    /// Channel positions, e.g. "N.S.L.C" or "S.N.L.C".
    #[arg(
        long = "sncl-order",
        value_name = "ORDER",
        default_value = DEFAULT_SNCL_ORDER,
        help = "Field order for SNCL patterns"
    )]
    pub sncl_order: String,

    /// Which archive file wins when two cover the same channel and day
    #[arg(
        long = "duplicate-policy",
        value_enum,
        default_value = "keep-first",
        help = "Tie-break for duplicate archive day files"
    )]
    pub duplicate_policy: DuplicatePolicyArg,
}

impl SourceArgs {
    /// Build the expediter configuration from the selected backend
    pub fn to_config(&self) -> Result<Config> {
        let source = match (&self.archive, &self.inventory, &self.metadata_url) {
            (Some(root), inventory, None) => DataSource::LocalArchive {
                root: root.clone(),
                inventory: inventory.clone(),
            },
            (None, Some(path), None) => DataSource::InventoryFile { path: path.clone() },
            (None, None, Some(endpoint)) => DataSource::RemoteMetadata {
                endpoint: endpoint.clone(),
                style: self.service_style.into(),
            },
            (None, None, None) => {
                return Err(Error::configuration(
                    "no availability source selected; pass --archive, --inventory, or --metadata-url",
                ));
            }
            _ => {
                return Err(Error::configuration(
                    "exactly one availability source may be selected",
                ));
            }
        };

        let mut config = Config::new(source);
        config.waveform_endpoint = self.waveform_url.clone();
        config.sncl_order = self.sncl_order.clone();
        config.duplicate_policy = self.duplicate_policy.into();
        Ok(config)
    }
}

/// Request window bounds shared by both subcommands
#[derive(Debug, Clone, Parser)]
pub struct WindowArgs {
    /// Window start (inclusive)
    ///
    /// Accepts RFC 3339 ("2002-04-20T00:00:00Z"), a naive UTC timestamp
    /// ("2002-04-20T00:00:00"), or a bare date ("2002-04-20").
    #[arg(long = "start", value_name = "TIME", help = "Window start (inclusive)")]
    pub start: String,

    /// Window end (exclusive)
    #[arg(long = "end", value_name = "TIME", help = "Window end (exclusive)")]
    pub end: String,
}

impl WindowArgs {
    pub fn to_window(&self) -> Result<RequestWindow> {
        RequestWindow::new(parse_instant(&self.start)?, parse_instant(&self.end)?)
    }
}

/// Optional geographic-radius constraint around a reference point
#[derive(Debug, Clone, Parser)]
pub struct RadiusArgs {
    /// Reference point latitude in decimal degrees
    #[arg(long = "latitude", value_name = "DEG", allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    /// Reference point longitude in decimal degrees
    #[arg(long = "longitude", value_name = "DEG", allow_hyphen_values = true)]
    pub longitude: Option<f64>,

    /// Minimum distance from the reference point, in degrees of arc
    #[arg(long = "min-radius", value_name = "DEG")]
    pub min_radius: Option<f64>,

    /// Maximum distance from the reference point, in degrees of arc
    #[arg(long = "max-radius", value_name = "DEG")]
    pub max_radius: Option<f64>,
}

impl RadiusArgs {
    pub fn to_filter(&self) -> Result<Option<RadiusFilter>> {
        RadiusFilter::from_args(self.latitude, self.longitude, self.min_radius, self.max_radius)
    }
}

/// Arguments for the availability command
#[derive(Debug, Clone, Parser)]
pub struct AvailabilityArgs {
    /// SNCL patterns to resolve, e.g. "US.OXF.*.BH?"
    ///
    /// Fields support the `*` and `?` wildcards; "--" stands for the blank
    /// location code.
    #[arg(value_name = "PATTERN", required = true)]
    pub patterns: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub radius: RadiusArgs,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Arguments for the fetch command
#[derive(Debug, Clone, Parser)]
pub struct FetchArgs {
    /// SNCL patterns selecting the channels to fetch
    #[arg(value_name = "PATTERN", required = true)]
    pub patterns: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub radius: RadiusArgs,

    /// Preferred waveform quality code, matched against local day-file
    /// quality letters and forwarded to remote services
    #[arg(long = "quality", value_name = "CODE")]
    pub quality: Option<char>,

    /// Keep the sample landing exactly on the window end
    #[arg(long = "inclusive-end")]
    pub inclusive_end: bool,

    /// Tolerate several metadata epochs overlapping the window, taking the
    /// earliest instead of failing the channel
    #[arg(long = "ignore-epoch-ambiguity")]
    pub ignore_epoch_ambiguity: bool,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl AvailabilityArgs {
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.quiet, self.verbose)
    }
}

impl FetchArgs {
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.quiet, self.verbose)
    }

    /// Apply the fetch policy flags on top of the source configuration
    pub fn to_config(&self) -> Result<Config> {
        let mut config = self.source.to_config()?;
        config.inclusive_end = self.inclusive_end;
        config.ignore_epoch_ambiguity = self.ignore_epoch_ambiguity;
        config.quality_code = self.quality;
        Ok(config)
    }
}

fn log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// CLI mirror of [`ServiceStyle`]
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ServiceStyleArg {
    Station,
    Array,
}

impl From<ServiceStyleArg> for ServiceStyle {
    fn from(value: ServiceStyleArg) -> Self {
        match value {
            ServiceStyleArg::Station => Self::Station,
            ServiceStyleArg::Array => Self::Array,
        }
    }
}

/// CLI mirror of [`DuplicatePolicy`]
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DuplicatePolicyArg {
    KeepFirst,
    KeepLast,
}

impl From<DuplicatePolicyArg> for DuplicatePolicy {
    fn from(value: DuplicatePolicyArg) -> Self {
        match value {
            DuplicatePolicyArg::KeepFirst => Self::KeepFirst,
            DuplicatePolicyArg::KeepLast => Self::KeepLast,
        }
    }
}

/// Parse a caller-supplied instant
///
/// Accepts RFC 3339, a naive timestamp taken as UTC, or a bare date taken as
/// UTC midnight.
pub fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::configuration(format!(
        "cannot parse instant '{text}'; use RFC 3339, YYYY-MM-DDTHH:MM:SS, or YYYY-MM-DD"
    )))
}
