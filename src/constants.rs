//! Application constants for the SNCL expediter
//!
//! This module contains archive filename conventions, epoch sentinels, and
//! default values used throughout the expediter.

// =============================================================================
// Archive Filename Conventions
// =============================================================================

/// Plain day-file naming convention: NET.STA.LOC.CHA.YYYY.DDD with an
/// optional trailing quality letter.
pub const PLAIN_DAYFILE_PATTERN: &str =
    r"^([A-Za-z0-9]+)\.([A-Za-z0-9]+)\.([A-Za-z0-9]*)\.([A-Za-z0-9]+)\.(\d{4})\.(\d{3})(?:\.?([A-Z]))?$";

/// SDS-style day-file naming convention: NET.STA.LOC.CHA.D.YYYY.DDD with an
/// optional trailing quality letter.
pub const SDS_DAYFILE_PATTERN: &str =
    r"^([A-Za-z0-9]+)\.([A-Za-z0-9]+)\.([A-Za-z0-9]*)\.([A-Za-z0-9]+)\.D\.(\d{4})\.(\d{3})(?:\.?([A-Z]))?$";

// =============================================================================
// Epoch and Window Sentinels
// =============================================================================

/// Conventional far-future instant standing in for an open-ended epoch end.
pub const FAR_FUTURE: &str = "2599-12-31T23:59:59Z";

/// Epsilon subtracted from a window end before computing the whole-day span,
/// so that an exact day boundary does not count as an extra day.
pub const DAY_SPAN_EPSILON_SECS: i64 = 1;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

// =============================================================================
// SNCL Defaults
// =============================================================================

/// Default SNCL field order: Network.Station.Location.Channel.
pub const DEFAULT_SNCL_ORDER: &str = "N.S.L.C";

/// Explicit blank-location sentinel accepted in patterns and identifiers.
pub const BLANK_LOCATION_SENTINEL: &str = "--";

/// Default waveform quality code requested from remote services.
pub const DEFAULT_QUALITY_CODE: char = 'B';

// =============================================================================
// Geodetic Constants
// =============================================================================

/// Maximum great-circle separation between two points, in degrees.
pub const MAX_DISTANCE_DEGREES: f64 = 180.0;

// =============================================================================
// Remote Service Defaults
// =============================================================================

/// Request timeout for remote metadata and waveform services, in seconds.
pub const REMOTE_TIMEOUT_SECS: u64 = 60;
