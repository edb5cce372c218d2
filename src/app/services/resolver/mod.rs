//! Availability resolution
//!
//! The central component: obtains candidate channel epochs from exactly one
//! configured source (local archive, local inventory file, or remote
//! metadata service), applies pattern, time-window, and geographic-radius
//! filters, deduplicates, and caches. One pattern failing transiently never
//! aborts the remaining patterns of a call.

use crate::app::models::{AvailabilityRecord, AvailabilityTable, ChannelIdentifier, RequestWindow};
use crate::app::services::archive_scanner::{ArchiveIndex, ArchiveScanner};
use crate::app::services::fetch::{FetchOptions, WaveformFetcher};
use crate::app::services::geodetic::RadiusFilter;
use crate::app::services::inventory;
use crate::app::services::sncl::{SnclOrder, SnclPattern};
use crate::config::{Config, DataSource};
use crate::{Error, Result, Stream};
use tracing::{debug, info, warn};

pub mod remote;

#[cfg(test)]
mod tests;

use remote::{HttpMetadataClient, MetadataClient};

/// Fingerprint of one availability query, for the last-filtered cache
///
/// Two calls with the same patterns (in order), window, and radius
/// constraint are "identical defaults" and share a cached answer.
#[derive(Debug, Clone, PartialEq)]
struct QueryFingerprint {
    patterns: Vec<String>,
    window: RequestWindow,
    radius: Option<RadiusFilter>,
}

/// The merged availability built once per process for local sources
#[derive(Debug)]
struct InitialAvailability {
    /// Window the initial table was built over; queries reaching past it
    /// force a rebuild
    window: RequestWindow,
    table: AvailabilityTable,
    index: ArchiveIndex,
}

/// Resolver over one configured availability source
pub struct AvailabilityResolver {
    config: Config,
    order: SnclOrder,
    metadata_client: Option<Box<dyn MetadataClient>>,
    initial: Option<InitialAvailability>,
    last: Option<(QueryFingerprint, AvailabilityTable)>,
}

impl AvailabilityResolver {
    /// Build a resolver, validating the configuration up front
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let order = config.order()?;
        let metadata_client: Option<Box<dyn MetadataClient>> = match &config.source {
            DataSource::RemoteMetadata { endpoint, style } => {
                Some(Box::new(HttpMetadataClient::new(endpoint.clone(), *style)?))
            }
            _ => None,
        };
        Ok(Self {
            config,
            order,
            metadata_client,
            initial: None,
            last: None,
        })
    }

    /// Build a resolver with an injected metadata client
    ///
    /// The seam used by tests; also the hook for callers bringing their own
    /// transport.
    pub fn with_metadata_client(config: Config, client: Box<dyn MetadataClient>) -> Result<Self> {
        let order = config.order()?;
        Ok(Self {
            config,
            order,
            metadata_client: Some(client),
            initial: None,
            last: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse a pattern using the configured field order
    pub fn parse_pattern(&self, text: &str) -> Result<SnclPattern> {
        SnclPattern::parse(text, &self.order)
    }

    /// Resolve availability for a set of patterns over a window
    ///
    /// Patterns are processed in the order supplied, once per unique pattern
    /// text; results are concatenated in that order and then deduplicated by
    /// (identifier, canonical start time). An empty final table is reported
    /// as `NoData`, distinct from transient failures, so a caller can
    /// short-circuit an analysis unit without treating it as fatal.
    pub fn get_availability(
        &mut self,
        patterns: &[String],
        window: &RequestWindow,
        radius: Option<&RadiusFilter>,
    ) -> Result<AvailabilityTable> {
        // malformed patterns are configuration errors, fatal to this run
        let parsed: Vec<SnclPattern> = patterns
            .iter()
            .map(|p| self.parse_pattern(p))
            .collect::<Result<_>>()?;

        // a broad wildcard repeated in the same call is resolved once
        let mut unique: Vec<SnclPattern> = Vec::new();
        for p in parsed {
            if !unique.iter().any(|u| u.canonical() == p.canonical()) {
                unique.push(p);
            }
        }

        let fingerprint = QueryFingerprint {
            patterns: unique.iter().map(|p| p.canonical()).collect(),
            window: *window,
            radius: radius.cloned(),
        };
        if let Some((cached_fp, cached)) = &self.last {
            if *cached_fp == fingerprint {
                debug!("availability served from last-filtered cache");
                return Ok(cached.clone());
            }
        }

        let mut accumulator = AvailabilityTable::new();
        for pattern in &unique {
            match self.resolve_pattern(pattern, window, radius) {
                Ok(records) => {
                    debug!("pattern {} matched {} epochs", pattern, records.len());
                    for r in records {
                        accumulator.push(r);
                    }
                }
                Err(e) if matches!(e, Error::TransientSource { .. }) => {
                    // a failing backend for one pattern must not abort the rest
                    warn!("pattern {} skipped: {}", pattern, e);
                }
                Err(e) => return Err(e),
            }
        }

        let table = accumulator.dedupe();
        if table.is_empty() {
            return Err(Error::no_data(format!(
                "no channel epochs match {:?} over {}",
                fingerprint.patterns, window
            )));
        }

        info!("availability resolved: {} channel epochs", table.len());
        self.last = Some((fingerprint, table.clone()));
        Ok(table)
    }

    /// Candidate epochs for one pattern, filtered and in source order
    fn resolve_pattern(
        &mut self,
        pattern: &SnclPattern,
        window: &RequestWindow,
        radius: Option<&RadiusFilter>,
    ) -> Result<Vec<AvailabilityRecord>> {
        let candidates: Vec<AvailabilityRecord> = if self.config.source.is_local() {
            // filter a copy of the cached initial table, never in place
            self.ensure_initial(window)?
                .table
                .records
                .iter()
                .filter(|r| pattern.matches_id(&r.sncl_id))
                .cloned()
                .collect()
        } else {
            let client = self
                .metadata_client
                .as_ref()
                .ok_or_else(|| Error::configuration("remote metadata client is not configured"))?;
            client.channel_epochs(pattern, window, radius)?
        };

        Ok(candidates
            .into_iter()
            .filter(|r| pattern.matches_id(&r.sncl_id))
            .filter(|r| radius.map(|f| f.admits(r)).unwrap_or(true))
            .filter(|r| r.overlaps(window))
            .collect())
    }

    /// Epochs overlapping a window for one exact identifier
    ///
    /// Used by the fetch engine to attach metadata to a stream.
    pub fn epochs_for(
        &mut self,
        id: &ChannelIdentifier,
        window: &RequestWindow,
    ) -> Result<Vec<AvailabilityRecord>> {
        let sncl_id = id.sncl_id();
        if self.config.source.is_local() {
            let initial = self.ensure_initial(window)?;
            Ok(initial
                .table
                .epochs_for(&sncl_id, window)
                .into_iter()
                .cloned()
                .collect())
        } else {
            let pattern = self.parse_pattern(&sncl_id)?;
            let client = self
                .metadata_client
                .as_ref()
                .ok_or_else(|| Error::configuration("remote metadata client is not configured"))?;
            Ok(client
                .channel_epochs(&pattern, window, None)?
                .into_iter()
                .filter(|r| r.sncl_id == sncl_id && r.overlaps(window))
                .collect())
        }
    }

    /// Archive index for the window, when the source is a local archive
    ///
    /// The index is built over the window's day bounds: the scanner accepts
    /// dates half-open on the end, so an unaligned end must be pushed out to
    /// the next midnight or the final partial day would never be indexed.
    pub fn archive_index(&mut self, window: &RequestWindow) -> Result<Option<&ArchiveIndex>> {
        if !matches!(self.config.source, DataSource::LocalArchive { .. }) {
            return Ok(None);
        }
        Ok(Some(&self.ensure_initial(&window.day_bounds())?.index))
    }

    /// Build (or rebuild) the initial availability for local sources
    ///
    /// Walking the filesystem dominates runtime for workloads issuing
    /// hundreds of availability queries, so the merged table is built once
    /// and only re-filtered per query. A query window reaching outside the
    /// built window widens it and triggers one rescan.
    fn ensure_initial(&mut self, window: &RequestWindow) -> Result<&InitialAvailability> {
        let needs_build = match &self.initial {
            None => true,
            Some(existing) => {
                window.start < existing.window.start || window.end > existing.window.end
            }
        };

        if needs_build {
            let build_window = match &self.initial {
                Some(existing) => RequestWindow::new(
                    window.start.min(existing.window.start),
                    window.end.max(existing.window.end),
                )?,
                None => *window,
            };

            let built = match &self.config.source {
                DataSource::LocalArchive { root, inventory } => {
                    let scanner =
                        ArchiveScanner::new(root.clone(), self.config.duplicate_policy);
                    let index = scanner.scan(&[], &build_window)?;
                    let coverage = index.coverage_records();
                    let records = match inventory {
                        Some(path) => {
                            let epochs = inventory::parse_inventory(path)?;
                            inventory::merge_metadata(coverage, &epochs)
                        }
                        None => coverage,
                    };
                    InitialAvailability {
                        window: build_window,
                        table: AvailabilityTable { records },
                        index,
                    }
                }
                DataSource::InventoryFile { path } => {
                    let records = inventory::parse_inventory(path)?;
                    InitialAvailability {
                        window: build_window,
                        table: AvailabilityTable { records },
                        index: ArchiveIndex::default(),
                    }
                }
                DataSource::RemoteMetadata { .. } => {
                    return Err(Error::configuration(
                        "initial availability is only built for local sources",
                    ));
                }
            };
            info!(
                "initial availability built: {} epochs over {}",
                built.table.len(),
                built.window
            );
            self.initial = Some(built);
            // the last-filtered cache may now be stale
            self.last = None;
        }

        Ok(self.initial.as_ref().expect("initial availability was just built"))
    }
}

/// Facade owning the resolver and the fetch engine
///
/// Metric calculators talk to this: "what channels match" and "give me the
/// waveform". Constructed once per process and passed to callers; all cache
/// state lives inside, never in globals.
pub struct Expediter {
    resolver: AvailabilityResolver,
    fetcher: WaveformFetcher,
}

impl Expediter {
    pub fn new(
        config: Config,
        codec: Box<dyn crate::app::services::fetch::codec::WaveformCodec>,
    ) -> Result<Self> {
        let fetcher = WaveformFetcher::new(&config, codec)?;
        let resolver = AvailabilityResolver::new(config)?;
        Ok(Self { resolver, fetcher })
    }

    /// Assemble from already-built parts (test seam)
    pub fn from_parts(resolver: AvailabilityResolver, fetcher: WaveformFetcher) -> Self {
        Self { resolver, fetcher }
    }

    pub fn config(&self) -> &Config {
        self.resolver.config()
    }

    /// Default fetch options derived from the configuration
    pub fn default_fetch_options(&self) -> FetchOptions {
        FetchOptions::from_config(self.resolver.config())
    }

    /// Resolve availability; see [`AvailabilityResolver::get_availability`]
    pub fn get_availability(
        &mut self,
        patterns: &[String],
        window: &RequestWindow,
        radius: Option<&RadiusFilter>,
    ) -> Result<AvailabilityTable> {
        self.resolver.get_availability(patterns, window, radius)
    }

    /// Fetch a waveform stream; see [`WaveformFetcher::fetch`]
    pub fn get_waveform(
        &mut self,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        options: &FetchOptions,
    ) -> Result<Stream> {
        self.fetcher.fetch(&mut self.resolver, id, window, options)
    }

    /// Parse a pattern using the configured field order
    pub fn parse_pattern(&self, text: &str) -> Result<SnclPattern> {
        self.resolver.parse_pattern(text)
    }
}
