//! Local archive scanner for day-file seismic waveform archives
//!
//! Walks the archive tree once and indexes every file whose name matches one
//! of the two recognized day-file conventions, keeping only files whose date
//! falls inside the requested range. Directory layout below the root is
//! unconstrained; only filenames matter.

use crate::app::models::{AvailabilityRecord, ChannelIdentifier};
use crate::app::services::sncl::SnclPattern;
use crate::config::DuplicatePolicy;
use crate::constants::{PLAIN_DAYFILE_PATTERN, SDS_DAYFILE_PATTERN};
use crate::{RequestWindow, Result};
use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One indexed archive file
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub id: ChannelIdentifier,
    pub date: NaiveDate,
    /// Trailing quality letter, when the filename carries one
    pub quality: Option<char>,
}

/// Index of archive files keyed by channel and day
///
/// BTreeMap keeps iteration deterministic, which the coverage records and
/// the multi-day fetch path both rely on.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    entries: BTreeMap<(String, NaiveDate), ArchiveEntry>,
}

impl ArchiveIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the file covering one channel on one day
    pub fn file_for(&self, sncl_id: &str, date: NaiveDate) -> Option<&ArchiveEntry> {
        self.entries.get(&(sncl_id.to_string(), date))
    }

    /// Distinct channels present in the index, in identifier order
    pub fn channels(&self) -> Vec<String> {
        let mut out: Vec<String> = self.entries.keys().map(|(id, _)| id.clone()).collect();
        out.dedup();
        out
    }

    /// Coverage records, one per channel, spanning the observed day range
    ///
    /// These rows carry no coordinate or instrument metadata; a companion
    /// inventory file supplies that when available.
    pub fn coverage_records(&self) -> Vec<AvailabilityRecord> {
        let mut per_channel: BTreeMap<String, (ChannelIdentifier, NaiveDate, NaiveDate)> =
            BTreeMap::new();
        for ((sncl_id, date), entry) in &self.entries {
            per_channel
                .entry(sncl_id.clone())
                .and_modify(|(_, first, last)| {
                    if date < first {
                        *first = *date;
                    }
                    if date > last {
                        *last = *date;
                    }
                })
                .or_insert((entry.id.clone(), *date, *date));
        }

        per_channel
            .into_values()
            .filter_map(|(id, first, last)| {
                let start = first.and_hms_opt(0, 0, 0)?.and_utc();
                let end = last.and_hms_opt(0, 0, 0)?.and_utc() + Duration::days(1);
                AvailabilityRecord::bare(id, start, Some(end)).ok()
            })
            .collect()
    }
}

/// Scanner over a local day-file archive
pub struct ArchiveScanner {
    root: PathBuf,
    duplicate_policy: DuplicatePolicy,
    plain: Regex,
    sds: Regex,
}

impl ArchiveScanner {
    pub fn new(root: impl Into<PathBuf>, duplicate_policy: DuplicatePolicy) -> Self {
        Self {
            root: root.into(),
            duplicate_policy,
            plain: Regex::new(PLAIN_DAYFILE_PATTERN).expect("day-file pattern compiles"),
            sds: Regex::new(SDS_DAYFILE_PATTERN).expect("SDS day-file pattern compiles"),
        }
    }

    /// Walk the tree once and index files matching the patterns inside the
    /// window's date range `[start.date, end.date)`
    pub fn scan(&self, patterns: &[SnclPattern], window: &RequestWindow) -> Result<ArchiveIndex> {
        info!("scanning archive at {}", self.root.display());
        let dates = window.dates();
        let mut index = ArchiveIndex::default();
        let mut scanned = 0usize;

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            scanned += 1;

            let Some(parsed) = self.parse_filename(entry.path()) else {
                continue;
            };

            if !dates.contains(&parsed.date) {
                continue;
            }

            let sncl_id = parsed.id.sncl_id();
            if !patterns.is_empty() && !patterns.iter().any(|p| p.matches_id(&sncl_id)) {
                continue;
            }

            let key = (sncl_id, parsed.date);
            match self.duplicate_policy {
                DuplicatePolicy::KeepFirst => {
                    if let Some(existing) = index.entries.get(&key) {
                        warn!(
                            "multiple archive files for {} on {}: keeping {}, discarding {}",
                            key.0,
                            key.1,
                            existing.path.display(),
                            parsed.path.display()
                        );
                        continue;
                    }
                    index.entries.insert(key, parsed);
                }
                DuplicatePolicy::KeepLast => {
                    if let Some(existing) = index.entries.insert(key.clone(), parsed) {
                        warn!(
                            "multiple archive files for {} on {}: discarding {}",
                            key.0,
                            key.1,
                            existing.path.display()
                        );
                    }
                }
            }
        }

        info!(
            "archive scan finished: {} files examined, {} indexed",
            scanned,
            index.len()
        );
        Ok(index)
    }

    /// Parse a filename against the two day-file conventions
    ///
    /// Files whose year/day segments do not form a real date are skipped
    /// with a debug note rather than treated as errors.
    fn parse_filename(&self, path: &Path) -> Option<ArchiveEntry> {
        let name = path.file_name()?.to_str()?;
        // the SDS form is stricter (literal ".D."), so try it first
        let caps = self.sds.captures(name).or_else(|| self.plain.captures(name))?;

        let year: i32 = caps.get(5)?.as_str().parse().ok()?;
        let day: u32 = caps.get(6)?.as_str().parse().ok()?;
        let Some(date) = NaiveDate::from_yo_opt(year, day) else {
            debug!("skipping {}: day {} is not valid in year {}", name, day, year);
            return None;
        };

        let id = ChannelIdentifier::new(
            caps.get(1)?.as_str(),
            caps.get(2)?.as_str(),
            caps.get(3)?.as_str(),
            caps.get(4)?.as_str(),
        );
        let quality = caps.get(7).and_then(|m| m.as_str().chars().next());

        Some(ArchiveEntry {
            path: path.to_path_buf(),
            id,
            date,
            quality,
        })
    }
}
