//! Station inventory file parsing
//!
//! Reads the pipe-delimited channel-epoch text format used for station
//! inventories: one row per channel epoch with coordinates, orientation,
//! instrument description, sensitivity, sample rate, and the epoch bounds.
//! Header and comment lines start with `#`. An empty end time marks an
//! open-ended epoch.

use crate::app::models::{AvailabilityRecord, ChannelIdentifier};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use tracing::{debug, info};

/// Column count of the channel-epoch row format
const CHANNEL_ROW_FIELDS: usize = 17;

/// Parse an inventory file into availability records
pub fn parse_inventory(path: &Path) -> Result<Vec<AvailabilityRecord>> {
    info!("loading station inventory from {}", path.display());
    let file = std::fs::File::open(path)
        .map_err(|e| Error::io(format!("cannot open inventory {}", path.display()), e))?;
    let records = parse_channel_rows(file, b'|')?;
    info!("inventory loaded: {} channel epochs", records.len());
    Ok(records)
}

/// Parse delimited channel-epoch rows from any reader
///
/// The same row shape arrives from inventory files (pipe-delimited) and from
/// remote metadata responses, which differ only in delimiter.
pub fn parse_channel_rows(data: impl std::io::Read, delimiter: u8) -> Result<Vec<AvailabilityRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    for (line_no, row) in reader.records().enumerate() {
        let row = row?;
        if row.len() != CHANNEL_ROW_FIELDS {
            debug!(
                "skipping inventory line {}: {} fields, expected {}",
                line_no + 1,
                row.len(),
                CHANNEL_ROW_FIELDS
            );
            continue;
        }
        match parse_row(&row) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!("skipping channel row {}: {}", line_no + 1, e);
            }
        }
    }

    Ok(records)
}

fn parse_row(row: &csv::StringRecord) -> Result<AvailabilityRecord> {
    let field = |i: usize| row.get(i).unwrap_or("").trim();

    let id = ChannelIdentifier::new(field(0), field(1), field(2), field(3));
    let start_time = parse_instant(field(15))
        .ok_or_else(|| Error::transient_msg(format!("bad epoch start '{}'", field(15))))?;
    let end_time = if field(16).is_empty() {
        None
    } else {
        Some(
            parse_instant(field(16))
                .ok_or_else(|| Error::transient_msg(format!("bad epoch end '{}'", field(16))))?,
        )
    };

    let mut record = AvailabilityRecord::bare(id, start_time, end_time)?;
    record.latitude = opt_f64(field(4));
    record.longitude = opt_f64(field(5));
    record.elevation = opt_f64(field(6));
    record.depth = opt_f64(field(7));
    record.azimuth = opt_f64(field(8));
    record.dip = opt_f64(field(9));
    record.instrument = opt_string(field(10));
    record.scale = opt_f64(field(11));
    record.scale_frequency = opt_f64(field(12));
    record.scale_units = opt_string(field(13));
    record.sample_rate = opt_f64(field(14));
    Ok(record)
}

/// Parse an instant with or without an explicit UTC suffix
fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = text.parse::<DateTime<Utc>>() {
        return Some(t);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn opt_f64(text: &str) -> Option<f64> {
    if text.is_empty() {
        None
    } else {
        text.parse().ok()
    }
}

fn opt_string(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Merge inventory metadata onto coverage records by identifier and time
/// overlap
///
/// Coverage rows from a bare archive scan carry no metadata and span the
/// whole observed day range; each inventory epoch overlapping a row donates
/// its fields to the intersected span, so a row straddling an epoch boundary
/// splits into one record per epoch. Rows with no overlapping inventory
/// epoch are kept as-is.
pub fn merge_metadata(
    coverage: Vec<AvailabilityRecord>,
    inventory: &[AvailabilityRecord],
) -> Vec<AvailabilityRecord> {
    let mut out = Vec::with_capacity(coverage.len());
    for row in coverage {
        let overlapping: Vec<&AvailabilityRecord> = inventory
            .iter()
            .filter(|inv| {
                inv.sncl_id == row.sncl_id
                    && inv.start_time < row.effective_end()
                    && inv.effective_end() > row.start_time
            })
            .collect();

        if overlapping.is_empty() {
            out.push(row);
            continue;
        }
        for inv in overlapping {
            let mut piece = row.clone();
            piece.start_time = row.start_time.max(inv.start_time);
            piece.end_time = Some(row.effective_end().min(inv.effective_end()));
            piece.adopt_metadata(inv);
            out.push(piece);
        }
    }
    out
}
