//! Fetch engine tests: slicing, day stitching, metadata attachment, and the
//! remote per-day path

use super::codec::TextWaveformCodec;
use super::remote::WaveformClient;
use super::*;
use crate::app::services::resolver::AvailabilityResolver;
use crate::config::DataSource;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn window(start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) -> RequestWindow {
    RequestWindow::new(start, end).unwrap()
}

fn oxf() -> ChannelIdentifier {
    ChannelIdentifier::new("US", "OXF", "", "BHZ")
}

fn opts() -> FetchOptions {
    FetchOptions {
        quality: None,
        inclusive_end: false,
        ignore_epoch_ambiguity: false,
    }
}

/// One text-codec record starting at `start`, 1 Hz, counting samples from
/// `first_value`
fn record(start: chrono::DateTime<Utc>, first_value: usize, count: usize) -> String {
    let mut out = format!(">> {} 1.0 M\n", start.to_rfc3339());
    for i in 0..count {
        let _ = write!(out, "{} ", first_value + i);
    }
    out.push('\n');
    out
}

fn write_day_file(root: &Path, name: &str, content: &str) {
    fs::write(root.join(name), content).unwrap();
}

fn archive_resolver(tmp: &TempDir, inventory: Option<&str>) -> AvailabilityResolver {
    let inventory_path = inventory.map(|content| {
        let path = tmp.path().join("inventory.txt");
        fs::write(&path, content).unwrap();
        path
    });
    AvailabilityResolver::new(Config::new(DataSource::LocalArchive {
        root: tmp.path().to_path_buf(),
        inventory: inventory_path,
    }))
    .unwrap()
}

fn local_fetcher() -> WaveformFetcher {
    WaveformFetcher::local_only(Box::new(TextWaveformCodec))
}

#[test]
fn test_single_day_fetch_slices_exactly() {
    let tmp = TempDir::new().unwrap();
    // day 110 of 2002, one hour of 1 Hz data from midnight
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 3600),
    );
    let mut resolver = archive_resolver(&tmp, None);

    let w = window(utc(2002, 4, 20, 0, 10, 0), utc(2002, 4, 20, 0, 20, 0));
    let stream = local_fetcher().fetch(&mut resolver, &oxf(), &w, &opts()).unwrap();

    assert!(stream.is_gap_free());
    assert_eq!(stream.sample_count(), 600);
    assert_eq!(stream.segments[0].samples[0], 600.0);
    assert_eq!(stream.quality, Some('M'));
}

#[test]
fn test_inclusive_end_keeps_boundary_sample() {
    let tmp = TempDir::new().unwrap();
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 3600),
    );
    let mut resolver = archive_resolver(&tmp, None);
    let w = window(utc(2002, 4, 20, 0, 10, 0), utc(2002, 4, 20, 0, 20, 0));

    let inclusive = FetchOptions {
        inclusive_end: true,
        ..opts()
    };
    let stream = local_fetcher()
        .fetch(&mut resolver, &oxf(), &w, &inclusive)
        .unwrap();
    assert_eq!(stream.sample_count(), 601);
    assert_eq!(*stream.segments[0].samples.last().unwrap(), 1200.0);
}

#[test]
fn test_cross_day_continuity_survives_concatenated_decode() {
    let tmp = TempDir::new().unwrap();
    // last ten minutes of day 110 and first ten minutes of day 111
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 23, 50, 0), 0, 600),
    );
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.111",
        &record(utc(2002, 4, 21, 0, 0, 0), 600, 600),
    );
    let mut resolver = archive_resolver(&tmp, None);

    let w = window(utc(2002, 4, 20, 23, 50, 0), utc(2002, 4, 21, 0, 10, 0));
    let stream = local_fetcher().fetch(&mut resolver, &oxf(), &w, &opts()).unwrap();

    // one continuous segment spanning midnight, not two
    assert!(stream.is_gap_free());
    assert_eq!(stream.sample_count(), 1200);
    assert_eq!(stream.segments[0].start, utc(2002, 4, 20, 23, 50, 0));
}

#[test]
fn test_window_ending_mid_day_reads_final_day_file() {
    let tmp = TempDir::new().unwrap();
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 600),
    );
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.111",
        &record(utc(2002, 4, 21, 0, 0, 0), 0, 600),
    );
    let mut resolver = archive_resolver(&tmp, None);

    // the end falls ten minutes into the 21st, so both day files hold samples
    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 21, 0, 10, 0));
    let stream = local_fetcher().fetch(&mut resolver, &oxf(), &w, &opts()).unwrap();

    assert_eq!(stream.segments.len(), 2);
    assert_eq!(stream.sample_count(), 1200);
    assert_eq!(stream.segments[1].start, utc(2002, 4, 21, 0, 0, 0));
}

#[test]
fn test_local_fetch_honors_quality_code() {
    let tmp = TempDir::new().unwrap();
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110.M",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 600),
    );
    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 20, 0, 10, 0));

    // the archive only holds an M file, so a Q request finds nothing
    let mut resolver = archive_resolver(&tmp, None);
    let mismatched = FetchOptions {
        quality: Some('Q'),
        ..opts()
    };
    let result = local_fetcher().fetch(&mut resolver, &oxf(), &w, &mismatched);
    assert!(matches!(result, Err(Error::NoData { .. })));

    let mut resolver = archive_resolver(&tmp, None);
    let matched = FetchOptions {
        quality: Some('M'),
        ..opts()
    };
    let stream = local_fetcher()
        .fetch(&mut resolver, &oxf(), &w, &matched)
        .unwrap();
    assert_eq!(stream.sample_count(), 600);
    assert_eq!(stream.quality, Some('M'));
}

#[test]
fn test_quality_request_accepts_unlettered_files() {
    let tmp = TempDir::new().unwrap();
    // no quality letter in the filename: the code cannot be verified
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 600),
    );
    let mut resolver = archive_resolver(&tmp, None);

    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 20, 0, 10, 0));
    let requested = FetchOptions {
        quality: Some('Q'),
        ..opts()
    };
    let stream = local_fetcher()
        .fetch(&mut resolver, &oxf(), &w, &requested)
        .unwrap();
    assert_eq!(stream.sample_count(), 600);
}

#[test]
fn test_three_day_fetch_equals_three_daily_fetches() {
    let tmp = TempDir::new().unwrap();
    for (day, name) in [(20, "110"), (21, "111"), (22, "112")] {
        write_day_file(
            tmp.path(),
            &format!("US.OXF..BHZ.2002.{name}"),
            &record(utc(2002, 4, day, 0, 0, 0), 0, 600),
        );
    }
    let fetcher = local_fetcher();

    let full = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 23, 0, 0, 0));
    let mut resolver = archive_resolver(&tmp, None);
    let stitched = fetcher.fetch(&mut resolver, &oxf(), &full, &opts()).unwrap();

    let mut daily_segments = Vec::new();
    for day in 20..=22 {
        let w = window(utc(2002, 4, day, 0, 0, 0), utc(2002, 4, day + 1, 0, 0, 0));
        let mut fresh = archive_resolver(&tmp, None);
        let stream = fetcher.fetch(&mut fresh, &oxf(), &w, &opts()).unwrap();
        for seg in &stream.segments {
            daily_segments.extend(seg.slice(&full, false));
        }
    }

    assert_eq!(stitched.segments.len(), daily_segments.len());
    for (a, b) in stitched.segments.iter().zip(daily_segments.iter()) {
        assert_eq!(a.start, b.start);
        assert_eq!(a.samples, b.samples);
    }
}

#[test]
fn test_missing_channel_is_no_data() {
    let tmp = TempDir::new().unwrap();
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 600),
    );
    let mut resolver = archive_resolver(&tmp, None);

    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 21, 0, 0, 0));
    let absent = ChannelIdentifier::new("US", "OXF", "", "BHN");
    let result = local_fetcher().fetch(&mut resolver, &absent, &w, &opts());
    assert!(matches!(result, Err(Error::NoData { .. })));
}

const TWO_EPOCH_INVENTORY: &str = "\
#Network|Station|Location|Channel|Latitude|Longitude|Elevation|Depth|Azimuth|Dip|SensorDescription|Scale|ScaleFreq|ScaleUnits|SampleRate|StartTime|EndTime
US|OXF||BHZ|34.5118|-89.4092|101.0|0.0|0.0|-90.0|Old sensor|111111|0.02|M/S|1.0|2000-01-01T00:00:00|2002-04-21T00:00:00
US|OXF||BHZ|34.5118|-89.4092|101.0|0.0|0.0|-90.0|New sensor|222222|0.02|M/S|1.0|2002-04-21T00:00:00|
";

#[test]
fn test_window_inside_first_epoch_succeeds() {
    let tmp = TempDir::new().unwrap();
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 600),
    );
    let mut resolver = archive_resolver(&tmp, Some(TWO_EPOCH_INVENTORY));

    // two epochs exist, but only the first overlaps this window
    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 20, 0, 10, 0));
    let stream = local_fetcher().fetch(&mut resolver, &oxf(), &w, &opts()).unwrap();
    assert_eq!(stream.metadata.scale, 111111.0);
    assert_eq!(stream.metadata.instrument.as_deref(), Some("Old sensor"));
}

#[test]
fn test_epoch_ambiguity_policy() {
    let tmp = TempDir::new().unwrap();
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.110",
        &record(utc(2002, 4, 20, 0, 0, 0), 0, 600),
    );
    write_day_file(
        tmp.path(),
        "US.OXF..BHZ.2002.111",
        &record(utc(2002, 4, 21, 0, 0, 0), 0, 600),
    );

    // window straddles the epoch boundary at 2002-04-21
    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 22, 0, 0, 0));

    let mut resolver = archive_resolver(&tmp, Some(TWO_EPOCH_INVENTORY));
    let strict = local_fetcher().fetch(&mut resolver, &oxf(), &w, &opts());
    assert!(matches!(strict, Err(Error::MultipleEpochs { count: 2, .. })));

    let mut resolver = archive_resolver(&tmp, Some(TWO_EPOCH_INVENTORY));
    let lenient = FetchOptions {
        ignore_epoch_ambiguity: true,
        ..opts()
    };
    let stream = local_fetcher()
        .fetch(&mut resolver, &oxf(), &w, &lenient)
        .unwrap();
    assert_eq!(stream.metadata.scale, 111111.0);
}

/// Canned waveform client serving one body per calendar day
struct CannedWaveforms {
    days: HashMap<NaiveDate, String>,
}

impl WaveformClient for CannedWaveforms {
    fn fetch_bytes(
        &self,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        _quality: Option<char>,
    ) -> Result<Vec<u8>> {
        self.days
            .get(&window.start.date_naive())
            .map(|body| body.as_bytes().to_vec())
            .ok_or_else(|| Error::no_data(format!("{id} over {window}")))
    }
}

fn inventory_resolver(tmp: &TempDir, inventory: &str) -> AvailabilityResolver {
    let path = tmp.path().join("inventory.txt");
    fs::write(&path, inventory).unwrap();
    AvailabilityResolver::new(Config::new(DataSource::InventoryFile { path })).unwrap()
}

#[test]
fn test_remote_fetch_merges_days_and_reslices_overshoot() {
    let tmp = TempDir::new().unwrap();
    let mut days = HashMap::new();
    // the service returns record-aligned data overshooting both edges
    days.insert(
        NaiveDate::from_ymd_opt(2002, 4, 20).unwrap(),
        record(utc(2002, 4, 19, 23, 59, 0), 0, 86_460),
    );
    days.insert(
        NaiveDate::from_ymd_opt(2002, 4, 21).unwrap(),
        record(utc(2002, 4, 21, 0, 0, 0), 86_460, 86_400),
    );
    let fetcher =
        WaveformFetcher::with_client(Box::new(TextWaveformCodec), Box::new(CannedWaveforms { days }));
    let mut resolver = inventory_resolver(
        &tmp,
        "US|OXF||BHZ|34.5|-89.4|101|0|0|-90|STS-2|629145000|0.02|M/S|1.0|2000-01-01T00:00:00|\n",
    );

    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 22, 0, 0, 0));
    let stream = fetcher.fetch(&mut resolver, &oxf(), &w, &opts()).unwrap();

    // contiguous days merge into one segment, sliced exactly to the window
    assert!(stream.is_gap_free());
    assert_eq!(stream.segments[0].start, w.start);
    assert_eq!(stream.sample_count(), 2 * 86_400);
    assert_eq!(stream.metadata.scale, 629145000.0);
}

#[test]
fn test_remote_fetch_day_gap_produces_segments() {
    let tmp = TempDir::new().unwrap();
    let mut days = HashMap::new();
    days.insert(
        NaiveDate::from_ymd_opt(2002, 4, 20).unwrap(),
        record(utc(2002, 4, 20, 0, 0, 0), 0, 600),
    );
    // no data at all on the 21st
    days.insert(
        NaiveDate::from_ymd_opt(2002, 4, 22).unwrap(),
        record(utc(2002, 4, 22, 0, 0, 0), 0, 600),
    );
    let fetcher =
        WaveformFetcher::with_client(Box::new(TextWaveformCodec), Box::new(CannedWaveforms { days }));
    let mut resolver = inventory_resolver(
        &tmp,
        "US|OXF||BHZ|34.5|-89.4|101|0|0|-90|STS-2|629145000|0.02|M/S|1.0|2000-01-01T00:00:00|\n",
    );

    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 23, 0, 0, 0));
    let stream = fetcher.fetch(&mut resolver, &oxf(), &w, &opts()).unwrap();
    assert!(!stream.is_gap_free());
    assert_eq!(stream.segments.len(), 2);
}

#[test]
fn test_flags_and_timing_quality_aggregated() {
    let tmp = TempDir::new().unwrap();
    let body = "\
>> 2002-04-20T00:00:00+00:00 1.0 M 1 0 3 80
0 1 2 3 4 5 6 7 8 9
>> 2002-04-20T00:01:00+00:00 1.0 M 0 0 2 100
0 1 2 3 4 5 6 7 8 9
";
    write_day_file(tmp.path(), "US.OXF..BHZ.2002.110", body);
    let mut resolver = archive_resolver(&tmp, None);

    let w = window(utc(2002, 4, 20, 0, 0, 0), utc(2002, 4, 20, 0, 2, 0));
    let stream = local_fetcher().fetch(&mut resolver, &oxf(), &w, &opts()).unwrap();

    assert_eq!(stream.flags.activity[0], 1);
    assert_eq!(stream.flags.data_quality[1], 2);
    assert_eq!(stream.timing_quality, Some(90.0));
    // gap between the two records
    assert_eq!(stream.segments.len(), 2);
}

#[test]
fn test_merge_contiguous_respects_rate_changes() {
    let id = oxf();
    let seg = |start, rate, n: usize| WaveformSegment {
        id: id.clone(),
        quality: None,
        start,
        sample_rate: rate,
        samples: vec![0.0; n],
    };
    let merged = merge_contiguous(vec![
        seg(utc(2020, 1, 1, 0, 0, 0), 1.0, 60),
        seg(utc(2020, 1, 1, 0, 1, 0), 1.0, 60),
        seg(utc(2020, 1, 1, 0, 2, 0), 2.0, 60),
    ]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].samples.len(), 120);
}
