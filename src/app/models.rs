//! Core data structures for availability resolution and waveform fetching.
//!
//! Defines channel identifiers, availability records and tables, request
//! windows, waveform segments and streams, and the boundary row type handed
//! to the metric computation library.

use crate::constants::{FAR_FUTURE, SECONDS_PER_DAY};
use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Network.Station.Location.Channel identifier for one seismic data channel
///
/// The location code may be blank; it is stored as an empty string and
/// rendered as such in the dotted identifier (`US.OXF..BHZ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelIdentifier {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl ChannelIdentifier {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        let location = location.into();
        Self {
            network: network.into(),
            station: station.into(),
            // "--" is an explicit blank-location sentinel on input
            location: if location == crate::constants::BLANK_LOCATION_SENTINEL {
                String::new()
            } else {
                location
            },
            channel: channel.into(),
        }
    }

    /// The fully qualified dotted identifier in canonical N.S.L.C order
    pub fn sncl_id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl fmt::Display for ChannelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sncl_id())
    }
}

/// One channel-epoch row of the availability table
///
/// Metadata fields are `Option` because a record built from a bare local
/// archive scan carries no coordinates or instrument response; downstream
/// code must handle the absent case explicitly rather than rely on NaN
/// propagation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub id: ChannelIdentifier,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub depth: Option<f64>,
    pub azimuth: Option<f64>,
    pub dip: Option<f64>,
    pub instrument: Option<String>,
    pub scale: Option<f64>,
    pub scale_frequency: Option<f64>,
    pub scale_units: Option<String>,
    pub sample_rate: Option<f64>,
    pub start_time: DateTime<Utc>,
    /// `None` means the epoch is open-ended
    pub end_time: Option<DateTime<Utc>>,
    /// Fully qualified identifier string, cached for dedupe and display
    pub sncl_id: String,
}

impl AvailabilityRecord {
    /// Create a bare record with no instrument metadata
    ///
    /// Validates the epoch ordering invariant.
    pub fn bare(
        id: ChannelIdentifier,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if let Some(end) = end_time {
            if start_time > end {
                return Err(Error::configuration(format!(
                    "epoch start {} is after epoch end {} for {}",
                    start_time,
                    end,
                    id.sncl_id()
                )));
            }
        }
        let sncl_id = id.sncl_id();
        Ok(Self {
            id,
            latitude: None,
            longitude: None,
            elevation: None,
            depth: None,
            azimuth: None,
            dip: None,
            instrument: None,
            scale: None,
            scale_frequency: None,
            scale_units: None,
            sample_rate: None,
            start_time,
            end_time,
            sncl_id,
        })
    }

    /// Effective epoch end, substituting the far-future convention for
    /// open-ended epochs
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or_else(far_future)
    }

    /// Whether this epoch overlaps the given request window
    pub fn overlaps(&self, window: &RequestWindow) -> bool {
        self.start_time < window.end && self.effective_end() > window.start
    }

    /// Whether this record carries usable coordinates
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Dedupe key: identifier plus canonical start-time string
    ///
    /// Start time is normalized to RFC 3339 so that rows differing only in
    /// time representation collapse to one key.
    pub fn dedupe_key(&self) -> (String, String) {
        (
            self.sncl_id.clone(),
            self.start_time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        )
    }

    /// Copy instrument/coordinate metadata from another record
    pub fn adopt_metadata(&mut self, other: &AvailabilityRecord) {
        self.latitude = other.latitude;
        self.longitude = other.longitude;
        self.elevation = other.elevation;
        self.depth = other.depth;
        self.azimuth = other.azimuth;
        self.dip = other.dip;
        self.instrument = other.instrument.clone();
        self.scale = other.scale;
        self.scale_frequency = other.scale_frequency;
        self.scale_units = other.scale_units.clone();
        if other.sample_rate.is_some() {
            self.sample_rate = other.sample_rate;
        }
    }
}

/// The conventional far-future instant for open-ended epochs
pub fn far_future() -> DateTime<Utc> {
    FAR_FUTURE
        .parse::<DateTime<Utc>>()
        .expect("FAR_FUTURE constant is a valid RFC 3339 instant")
}

/// An ordered collection of availability records
///
/// Order is the order rows were appended (per-pattern resolution order);
/// `dedupe` preserves first occurrences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityTable {
    pub records: Vec<AvailabilityRecord>,
}

impl AvailabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: AvailabilityRecord) {
        self.records.push(record);
    }

    /// Append all rows of another table, preserving order
    pub fn extend(&mut self, other: AvailabilityTable) {
        self.records.extend(other.records);
    }

    /// Remove duplicate rows keyed on (identifier, canonical start time),
    /// keeping the first occurrence
    ///
    /// Filters into a new collection; the table is never mutated while being
    /// iterated.
    pub fn dedupe(&self) -> AvailabilityTable {
        let mut seen = std::collections::HashSet::new();
        let records = self
            .records
            .iter()
            .filter(|r| seen.insert(r.dedupe_key()))
            .cloned()
            .collect();
        AvailabilityTable { records }
    }

    /// Rows whose epoch overlaps the window, as a new table
    pub fn filter_window(&self, window: &RequestWindow) -> AvailabilityTable {
        AvailabilityTable {
            records: self
                .records
                .iter()
                .filter(|r| r.overlaps(window))
                .cloned()
                .collect(),
        }
    }

    /// Rows overlapping the window for one exact identifier
    pub fn epochs_for(&self, sncl_id: &str, window: &RequestWindow) -> Vec<&AvailabilityRecord> {
        self.records
            .iter()
            .filter(|r| r.sncl_id == sncl_id && r.overlaps(window))
            .collect()
    }
}

/// A half-open request time window `[start, end)`
///
/// Whether the end instant itself is included in a waveform slice is decided
/// per fetch by the `inclusive_end` flag, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RequestWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Number of whole days spanned: `ceil((end - epsilon) - start)`
    ///
    /// The epsilon keeps an exact multiple-of-a-day window from counting an
    /// extra day.
    pub fn day_span(&self) -> i64 {
        let span = self.end - Duration::seconds(crate::constants::DAY_SPAN_EPSILON_SECS)
            - self.start;
        let secs = span.num_seconds().max(0);
        secs / SECONDS_PER_DAY + 1
    }

    /// Day-aligned sub-windows covering `[start, end)`, in order
    ///
    /// Each sub-window is clamped to the request bounds, so the first starts
    /// at `start` and the last ends at `end`.
    pub fn day_windows(&self) -> Vec<RequestWindow> {
        let mut out = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next_midnight = (cursor + Duration::days(1))
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is a valid time")
                .and_utc();
            let end = next_midnight.min(self.end);
            out.push(RequestWindow { start: cursor, end });
            cursor = end;
        }
        out
    }

    /// The calendar dates `[start.date, end.date)` covered by this window,
    /// always at least the start date
    ///
    /// This is the half-open acceptance range for availability scans. A
    /// fetch that must read every day containing samples uses
    /// [`sample_dates`](Self::sample_dates) instead: a window ending mid-day
    /// still has samples on its final date.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut d = self.start.date_naive();
        let last = self.end.date_naive();
        while d < last || out.is_empty() {
            out.push(d);
            d = d.succ_opt().expect("date range stays in bounds");
            if d > last {
                break;
            }
        }
        out
    }

    /// The calendar dates containing at least one instant of the window,
    /// `start.date ..= (end - epsilon).date`
    pub fn sample_dates(&self) -> Vec<NaiveDate> {
        self.day_windows()
            .iter()
            .map(|w| w.start.date_naive())
            .collect()
    }

    /// The smallest day-aligned window containing this one
    ///
    /// Under the half-open date acceptance of an archive scan, the aligned
    /// end guarantees the scan indexes every date in
    /// [`sample_dates`](Self::sample_dates).
    pub fn day_bounds(&self) -> RequestWindow {
        let start = self
            .start
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();
        let end_midnight = self
            .end
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();
        let end = if self.end == end_midnight {
            end_midnight
        } else {
            end_midnight + Duration::days(1)
        };
        RequestWindow { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

impl fmt::Display for RequestWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Per-stream state-of-health flag counts
///
/// One counter per bit of the activity, I/O-and-clock, and data-quality flag
/// bytes carried by the waveform container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCounts {
    pub activity: [u64; 8],
    pub io_clock: [u64; 8],
    pub data_quality: [u64; 8],
}

impl FlagCounts {
    /// Add another set of counts into this one
    pub fn accumulate(&mut self, other: &FlagCounts) {
        for i in 0..8 {
            self.activity[i] += other.activity[i];
            self.io_clock[i] += other.io_clock[i];
            self.data_quality[i] += other.data_quality[i];
        }
    }

    /// Total count across all data-quality bits
    pub fn data_quality_total(&self) -> u64 {
        self.data_quality.iter().sum()
    }
}

/// A contiguous run of samples for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSegment {
    pub id: ChannelIdentifier,
    pub quality: Option<char>,
    pub start: DateTime<Utc>,
    pub sample_rate: f64,
    pub samples: Vec<f64>,
}

impl WaveformSegment {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Instant just past the last sample
    pub fn end_time(&self) -> DateTime<Utc> {
        if self.sample_rate <= 0.0 {
            return self.start;
        }
        let span_micros = (self.samples.len() as f64 / self.sample_rate * 1e6).round() as i64;
        self.start + Duration::microseconds(span_micros)
    }

    /// Trim samples to the window; `inclusive_end` keeps the sample landing
    /// exactly on the end instant
    pub fn slice(&self, window: &RequestWindow, inclusive_end: bool) -> Option<WaveformSegment> {
        if self.sample_rate <= 0.0 || self.samples.is_empty() {
            return None;
        }
        let dt_micros = 1e6 / self.sample_rate;
        let offset_micros = (window.start - self.start).num_microseconds()?;
        let first = if offset_micros <= 0 {
            0usize
        } else {
            (offset_micros as f64 / dt_micros).ceil() as usize
        };
        let end_offset = (window.end - self.start).num_microseconds()?;
        let raw_last = end_offset as f64 / dt_micros;
        // exclusive end drops a sample landing exactly on the boundary
        let mut last = raw_last.floor() as i64;
        if !inclusive_end && (raw_last - raw_last.floor()).abs() < 1e-9 {
            last -= 1;
        }
        let last = last.min(self.samples.len() as i64 - 1);
        if last < first as i64 {
            return None;
        }
        let first_time = self.start
            + Duration::microseconds((first as f64 * dt_micros).round() as i64);
        Some(WaveformSegment {
            id: self.id.clone(),
            quality: self.quality,
            start: first_time,
            sample_rate: self.sample_rate,
            samples: self.samples[first..=(last as usize)].to_vec(),
        })
    }
}

/// Stream-level metadata copied from the resolved availability record
///
/// Sensitivity scale surfaces as NaN when unknown so that downstream
/// averaging detects the gap; every other absent field stays `None`.
#[derive(Debug, Clone, Default)]
pub struct StreamMetadata {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub depth: Option<f64>,
    pub azimuth: Option<f64>,
    pub dip: Option<f64>,
    pub instrument: Option<String>,
    pub scale: f64,
    pub scale_frequency: Option<f64>,
    pub scale_units: Option<String>,
}

impl StreamMetadata {
    /// Metadata for a channel with no resolved epoch
    pub fn unknown() -> Self {
        Self {
            scale: f64::NAN,
            ..Default::default()
        }
    }

    pub fn from_record(record: &AvailabilityRecord) -> Self {
        Self {
            latitude: record.latitude,
            longitude: record.longitude,
            elevation: record.elevation,
            depth: record.depth,
            azimuth: record.azimuth,
            dip: record.dip,
            instrument: record.instrument.clone(),
            scale: record.scale.unwrap_or(f64::NAN),
            scale_frequency: record.scale_frequency,
            scale_units: record.scale_units.clone(),
        }
    }
}

/// An ordered sequence of waveform segments answering one fetch request
///
/// More than one segment signals a gap inside the requested window.
#[derive(Debug, Clone)]
pub struct Stream {
    pub id: ChannelIdentifier,
    pub requested: RequestWindow,
    pub quality: Option<char>,
    pub segments: Vec<WaveformSegment>,
    pub flags: FlagCounts,
    pub timing_quality: Option<f64>,
    pub metadata: StreamMetadata,
}

impl Stream {
    /// A gap-free stream has exactly one segment
    pub fn is_gap_free(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn sample_count(&self) -> usize {
        self.segments.iter().map(|s| s.sample_count()).sum()
    }

    /// Actual coverage start, if any samples were returned
    pub fn actual_start(&self) -> Option<DateTime<Utc>> {
        self.segments.first().map(|s| s.start)
    }

    /// Actual coverage end, if any samples were returned
    pub fn actual_end(&self) -> Option<DateTime<Utc>> {
        self.segments.last().map(|s| s.end_time())
    }
}

/// One row handed back by the metric computation library
///
/// The engine constructs streams and consumes these rows opaquely; it never
/// inspects or validates the values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric_name: String,
    pub sncl_id: String,
    pub quality: Option<char>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub value: MetricValue,
    pub quality_flag: Option<String>,
}

/// Numeric or textual metric value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}
