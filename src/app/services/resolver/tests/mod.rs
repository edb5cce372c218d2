//! Resolver tests covering the local-archive, inventory, and remote paths

use super::remote::MetadataClient;
use super::*;
use crate::app::models::AvailabilityRecord;
use crate::config::{DataSource, ServiceStyle};
use chrono::{TimeZone, Utc};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::path::Path;
use tempfile::TempDir;

fn window(y1: i32, m1: u32, d1: u32, y2: i32, m2: u32, d2: u32) -> RequestWindow {
    RequestWindow::new(
        Utc.with_ymd_and_hms(y1, m1, d1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(y2, m2, d2, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

fn touch(dir: &Path, rel: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"data").unwrap();
}

fn patterns(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|s| s.to_string()).collect()
}

const OXF_INVENTORY: &str = "\
#Network|Station|Location|Channel|Latitude|Longitude|Elevation|Depth|Azimuth|Dip|SensorDescription|Scale|ScaleFreq|ScaleUnits|SampleRate|StartTime|EndTime
US|OXF||BHZ|34.5118|-89.4092|101.0|0.0|0.0|-90.0|Streckeisen STS-2|629145000|0.02|M/S|40.0|2000-01-01T00:00:00|
";

fn local_archive_resolver(tmp: &TempDir, inventory: Option<&str>) -> AvailabilityResolver {
    let inventory_path = inventory.map(|content| {
        let path = tmp.path().join("inventory.txt");
        fs::write(&path, content).unwrap();
        path
    });
    let config = Config::new(DataSource::LocalArchive {
        root: tmp.path().to_path_buf(),
        inventory: inventory_path,
    });
    AvailabilityResolver::new(config).unwrap()
}

/// Canned metadata client recording how often it was called
struct CannedClient {
    epochs: Vec<AvailabilityRecord>,
    fail_for: Option<String>,
    calls: Rc<RefCell<usize>>,
}

impl CannedClient {
    fn new(epochs: Vec<AvailabilityRecord>) -> Self {
        Self {
            epochs,
            fail_for: None,
            calls: Rc::new(RefCell::new(0)),
        }
    }

    fn call_counter(&self) -> Rc<RefCell<usize>> {
        Rc::clone(&self.calls)
    }

    fn failing_for(mut self, canonical_pattern: &str) -> Self {
        self.fail_for = Some(canonical_pattern.to_string());
        self
    }
}

impl MetadataClient for CannedClient {
    fn channel_epochs(
        &self,
        pattern: &SnclPattern,
        _window: &RequestWindow,
        _radius: Option<&RadiusFilter>,
    ) -> Result<Vec<AvailabilityRecord>> {
        *self.calls.borrow_mut() += 1;
        if self.fail_for.as_deref() == Some(pattern.canonical().as_str()) {
            return Err(Error::transient_msg("endpoint unreachable"));
        }
        Ok(self
            .epochs
            .iter()
            .filter(|r| pattern.matches_id(&r.sncl_id))
            .cloned()
            .collect())
    }
}

fn remote_resolver(client: CannedClient) -> AvailabilityResolver {
    let config = Config::new(DataSource::RemoteMetadata {
        endpoint: "https://example.org/fdsnws/station/1".to_string(),
        style: ServiceStyle::Station,
    });
    AvailabilityResolver::with_metadata_client(config, Box::new(client)).unwrap()
}

fn epoch(
    n: &str,
    s: &str,
    l: &str,
    c: &str,
    start: chrono::DateTime<Utc>,
    end: Option<chrono::DateTime<Utc>>,
) -> AvailabilityRecord {
    AvailabilityRecord::bare(ChannelIdentifier::new(n, s, l, c), start, end).unwrap()
}

#[test]
fn test_archive_scenario_single_day_file() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "2002/US.OXF..BHZ.2002.110");

    let mut resolver = local_archive_resolver(&tmp, None);
    let table = resolver
        .get_availability(
            &patterns(&["US.OXF..BHZ"]),
            &window(2002, 4, 19, 2002, 4, 22),
            None,
        )
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.records[0].sncl_id, "US.OXF..BHZ");
}

#[test]
fn test_archive_with_inventory_gets_coordinates() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "US.OXF..BHZ.2002.110");

    let mut resolver = local_archive_resolver(&tmp, Some(OXF_INVENTORY));
    let table = resolver
        .get_availability(
            &patterns(&["US.OXF..BHZ"]),
            &window(2002, 4, 19, 2002, 4, 22),
            None,
        )
        .unwrap();

    assert_eq!(table.records[0].latitude, Some(34.5118));
    assert_eq!(table.records[0].scale, Some(629145000.0));
}

#[test]
fn test_radius_excludes_distant_station_as_no_data() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "US.OXF..BHZ.2002.110");

    let mut resolver = local_archive_resolver(&tmp, Some(OXF_INVENTORY));
    // a point about 20 degrees from OXF, max radius 15
    let radius = RadiusFilter::from_args(Some(34.5), Some(-69.4), Some(0.0), Some(15.0))
        .unwrap()
        .unwrap();
    let result = resolver.get_availability(
        &patterns(&["US.OXF..BHZ"]),
        &window(2002, 4, 19, 2002, 4, 22),
        Some(&radius),
    );

    assert!(matches!(result, Err(Error::NoData { .. })));
}

#[test]
fn test_radius_keeps_station_inside() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "US.OXF..BHZ.2002.110");

    let mut resolver = local_archive_resolver(&tmp, Some(OXF_INVENTORY));
    let radius = RadiusFilter::from_args(Some(34.5), Some(-89.4), Some(0.0), Some(15.0))
        .unwrap()
        .unwrap();
    let table = resolver
        .get_availability(
            &patterns(&["US.OXF..BHZ"]),
            &window(2002, 4, 19, 2002, 4, 22),
            Some(&radius),
        )
        .unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn test_window_outside_coverage_is_no_data() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "US.OXF..BHZ.2002.110");

    let mut resolver = local_archive_resolver(&tmp, None);
    let result = resolver.get_availability(
        &patterns(&["US.OXF..BHZ"]),
        &window(2003, 1, 1, 2003, 1, 4),
        None,
    );
    assert!(matches!(result, Err(Error::NoData { .. })));
}

#[test]
fn test_malformed_pattern_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let mut resolver = local_archive_resolver(&tmp, None);
    let result = resolver.get_availability(
        &patterns(&["US.OXF.BHZ"]),
        &window(2002, 4, 19, 2002, 4, 22),
        None,
    );
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn test_one_failing_pattern_does_not_abort_the_rest() {
    let w = window(2010, 1, 1, 2010, 1, 4);
    let client = CannedClient::new(vec![
        epoch("IU", "ANMO", "00", "BHZ", w.start, None),
        epoch("US", "OXF", "", "BHZ", w.start, None),
    ])
    .failing_for("XX.FAIL..BHZ");

    let mut resolver = remote_resolver(client);
    let table = resolver
        .get_availability(
            &patterns(&["IU.ANMO.00.BHZ", "XX.FAIL..BHZ", "US.OXF..BHZ"]),
            &w,
            None,
        )
        .unwrap();

    // the failing pattern is skipped, the other two still resolve
    assert_eq!(table.len(), 2);
    assert_eq!(table.records[0].sncl_id, "IU.ANMO.00.BHZ");
    assert_eq!(table.records[1].sncl_id, "US.OXF..BHZ");
}

#[test]
fn test_all_patterns_failing_is_no_data() {
    let w = window(2010, 1, 1, 2010, 1, 4);
    let client = CannedClient::new(Vec::new()).failing_for("XX.FAIL..BHZ");
    let mut resolver = remote_resolver(client);
    let result = resolver.get_availability(&patterns(&["XX.FAIL..BHZ"]), &w, None);
    assert!(matches!(result, Err(Error::NoData { .. })));
}

#[test]
fn test_overlapping_patterns_dedupe() {
    let w = window(2010, 1, 1, 2010, 1, 4);
    let client = CannedClient::new(vec![epoch("US", "OXF", "", "BHZ", w.start, None)]);
    let mut resolver = remote_resolver(client);

    let table = resolver
        .get_availability(&patterns(&["US.OXF..BHZ", "*.*.*.BHZ"]), &w, None)
        .unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn test_repeated_pattern_resolved_once() {
    let w = window(2010, 1, 1, 2010, 1, 4);
    let client = CannedClient::new(vec![epoch("US", "OXF", "", "BHZ", w.start, None)]);
    let calls = client.call_counter();
    let mut resolver = remote_resolver(client);

    resolver
        .get_availability(&patterns(&["*.*.*.BHZ", "*.*.*.BHZ", "*.*.*.BHZ"]), &w, None)
        .unwrap();

    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn test_identical_query_served_from_cache() {
    let w = window(2010, 1, 1, 2010, 1, 4);
    let client = CannedClient::new(vec![epoch("US", "OXF", "", "BHZ", w.start, None)]);
    let calls = client.call_counter();
    let mut resolver = remote_resolver(client);

    let first = resolver
        .get_availability(&patterns(&["US.OXF..BHZ"]), &w, None)
        .unwrap();
    let second = resolver
        .get_availability(&patterns(&["US.OXF..BHZ"]), &w, None)
        .unwrap();
    assert_eq!(first.len(), second.len());
    // the second call was answered from the last-filtered cache
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn test_epochs_for_window_inside_one_epoch() {
    let boundary = Utc.with_ymd_and_hms(2005, 6, 30, 0, 0, 0).unwrap();
    let client = CannedClient::new(vec![
        epoch(
            "US",
            "OXF",
            "",
            "BHZ",
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            Some(boundary),
        ),
        epoch("US", "OXF", "", "BHZ", boundary, None),
    ]);
    let mut resolver = remote_resolver(client);

    // window entirely inside the first epoch
    let inside = window(2002, 4, 19, 2002, 4, 22);
    let epochs = resolver
        .epochs_for(&ChannelIdentifier::new("US", "OXF", "", "BHZ"), &inside)
        .unwrap();
    assert_eq!(epochs.len(), 1);

    // window straddling the boundary sees both
    let straddling = window(2005, 6, 29, 2005, 7, 2);
    let epochs = resolver
        .epochs_for(&ChannelIdentifier::new("US", "OXF", "", "BHZ"), &straddling)
        .unwrap();
    assert_eq!(epochs.len(), 2);
}

#[test]
fn test_initial_availability_rebuilt_for_wider_window() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "US.OXF..BHZ.2002.110");
    touch(tmp.path(), "US.OXF..BHZ.2002.200");

    let mut resolver = local_archive_resolver(&tmp, None);
    // first query only covers April
    let spring = resolver
        .get_availability(
            &patterns(&["US.OXF..BHZ"]),
            &window(2002, 4, 19, 2002, 4, 22),
            None,
        )
        .unwrap();
    assert_eq!(spring.len(), 1);

    // widening into July forces a rescan that picks up day 200
    let summer = resolver
        .get_availability(
            &patterns(&["US.OXF..BHZ"]),
            &window(2002, 4, 19, 2002, 7, 25),
            None,
        )
        .unwrap();
    assert_eq!(summer.len(), 1);
    let record = &summer.records[0];
    assert_eq!(
        record.end_time,
        Some(Utc.with_ymd_and_hms(2002, 7, 20, 0, 0, 0).unwrap())
    );
}
