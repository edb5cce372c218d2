//! Waveform fetching, stitching, and slicing
//!
//! Given a resolved channel and a time window, retrieves raw container
//! bytes (single archive file, multi-day concatenation, or remote calls),
//! decodes, sorts, slices to the exact requested window, aggregates
//! state-of-health flags, and attaches metadata from the availability
//! resolver.

use crate::app::models::{
    ChannelIdentifier, FlagCounts, RequestWindow, Stream, StreamMetadata, WaveformSegment,
};
use crate::app::services::resolver::AvailabilityResolver;
use crate::config::Config;
use crate::{Error, Result};
use std::io::Read;
use tracing::{debug, warn};

pub mod codec;
pub mod remote;

#[cfg(test)]
mod tests;

use codec::{DecodedWaveform, WaveformCodec};
use remote::{HttpWaveformClient, WaveformClient};

/// Per-fetch policy knobs
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Desired quality code, forwarded to remote services and matched
    /// against the quality letter of local day files that carry one
    pub quality: Option<char>,
    /// Keep the sample landing exactly on the window end
    pub inclusive_end: bool,
    /// Tolerate more than one metadata epoch overlapping the window
    pub ignore_epoch_ambiguity: bool,
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quality: config.quality_code,
            inclusive_end: config.inclusive_end,
            ignore_epoch_ambiguity: config.ignore_epoch_ambiguity,
        }
    }
}

/// The waveform fetch engine
pub struct WaveformFetcher {
    codec: Box<dyn WaveformCodec>,
    waveform_client: Option<Box<dyn WaveformClient>>,
}

impl WaveformFetcher {
    pub fn new(config: &Config, codec: Box<dyn WaveformCodec>) -> Result<Self> {
        let waveform_client: Option<Box<dyn WaveformClient>> = match &config.waveform_endpoint {
            Some(endpoint) => Some(Box::new(HttpWaveformClient::new(endpoint.clone())?)),
            None => None,
        };
        Ok(Self {
            codec,
            waveform_client,
        })
    }

    /// Build a fetcher with an injected waveform client (test seam)
    pub fn with_client(codec: Box<dyn WaveformCodec>, client: Box<dyn WaveformClient>) -> Self {
        Self {
            codec,
            waveform_client: Some(client),
        }
    }

    /// Build a fetcher that only reads local archive files
    pub fn local_only(codec: Box<dyn WaveformCodec>) -> Self {
        Self {
            codec,
            waveform_client: None,
        }
    }

    /// Fetch one channel over one window
    ///
    /// Fails with `NoData` when no source yields samples in the window, and
    /// with `MultipleEpochs` when metadata is ambiguous and the caller did
    /// not opt out of the check.
    pub fn fetch(
        &self,
        resolver: &mut AvailabilityResolver,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        options: &FetchOptions,
    ) -> Result<Stream> {
        debug!("fetching {} over {} ({} day(s))", id, window, window.day_span());

        let from_archive = resolver.archive_index(window)?.is_some();
        let (segments, flags, timing_quality) = if from_archive {
            self.fetch_local(resolver, id, window, options)?
        } else {
            self.fetch_remote(id, window, options)?
        };

        if segments.is_empty() {
            return Err(Error::no_data(format!("{id} over {window}")));
        }

        let metadata = self.attach_metadata(resolver, id, window, options)?;

        Ok(Stream {
            id: id.clone(),
            requested: *window,
            quality: options.quality.or(segments[0].quality),
            segments,
            flags,
            timing_quality,
            metadata,
        })
    }

    /// Local path: concatenate each covered day's raw bytes into one buffer
    /// and decode once, so cross-day continuity is resolved at decode time
    ///
    /// Days are enumerated by sample content, so a window ending mid-day
    /// still reads its final day file. Files whose quality letter conflicts
    /// with the requested code are skipped; the duplicate policy resolves
    /// channel+day collisions before the quality check.
    fn fetch_local(
        &self,
        resolver: &mut AvailabilityResolver,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        options: &FetchOptions,
    ) -> Result<(Vec<WaveformSegment>, FlagCounts, Option<f64>)> {
        let sncl_id = id.sncl_id();
        let mut buffer = Vec::new();
        {
            let index = resolver
                .archive_index(window)?
                .expect("local fetch requires an archive index");
            for date in window.sample_dates() {
                let Some(entry) = index.file_for(&sncl_id, date) else {
                    debug!("no archive file for {} on {}", sncl_id, date);
                    continue;
                };
                if let (Some(want), Some(have)) = (options.quality, entry.quality) {
                    if want != have {
                        debug!(
                            "skipping {}: quality {} does not match requested {}",
                            entry.path.display(),
                            have,
                            want
                        );
                        continue;
                    }
                }
                let mut file = std::fs::File::open(&entry.path).map_err(|e| {
                    Error::io(format!("cannot read {}", entry.path.display()), e)
                })?;
                file.read_to_end(&mut buffer)?;
            }
        }
        if buffer.is_empty() {
            return Ok((Vec::new(), FlagCounts::default(), None));
        }

        let decoded = self.codec.decode(&buffer, id)?;
        Ok(finish_decoded(decoded, window, options))
    }

    /// Remote path: one call per day-aligned sub-window, merged, then a
    /// secondary slice because the service may return record-aligned data
    /// overshooting the window
    fn fetch_remote(
        &self,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        options: &FetchOptions,
    ) -> Result<(Vec<WaveformSegment>, FlagCounts, Option<f64>)> {
        let client = self.waveform_client.as_ref().ok_or_else(|| {
            Error::configuration("no local archive and no waveform endpoint configured")
        })?;

        let mut merged = DecodedWaveform::default();
        for day in window.day_windows() {
            match client.fetch_bytes(id, &day, options.quality) {
                Ok(bytes) => {
                    let decoded = self.codec.decode(&bytes, id)?;
                    merged.segments.extend(decoded.segments);
                    merged.flags.accumulate(&decoded.flags);
                    merged.timing_quality.extend(decoded.timing_quality);
                }
                Err(Error::NoData { .. }) => {
                    debug!("no remote data for {} on day {}", id, day);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(finish_decoded(merged, window, options))
    }

    /// Attach sensitivity and coordinates from the resolver
    ///
    /// Zero overlapping epochs leaves the metadata unknown; more than one is
    /// an error unless the caller opted out, in which case the first epoch
    /// wins with a warning.
    fn attach_metadata(
        &self,
        resolver: &mut AvailabilityResolver,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        options: &FetchOptions,
    ) -> Result<StreamMetadata> {
        let epochs = resolver.epochs_for(id, window)?;
        match epochs.len() {
            0 => {
                debug!("no metadata epoch for {} over {}", id, window);
                Ok(StreamMetadata::unknown())
            }
            1 => Ok(StreamMetadata::from_record(&epochs[0])),
            n if options.ignore_epoch_ambiguity => {
                warn!(
                    "{} metadata epochs overlap {} for {}; using the earliest",
                    n, window, id
                );
                Ok(StreamMetadata::from_record(&epochs[0]))
            }
            n => Err(Error::multiple_epochs(id.sncl_id(), n)),
        }
    }
}

/// Sort, merge contiguity, slice to the window, and summarize quality
fn finish_decoded(
    mut decoded: DecodedWaveform,
    window: &RequestWindow,
    options: &FetchOptions,
) -> (Vec<WaveformSegment>, FlagCounts, Option<f64>) {
    decoded.segments.sort_by_key(|s| s.start);
    let merged = merge_contiguous(decoded.segments);
    let sliced: Vec<WaveformSegment> = merged
        .iter()
        .filter_map(|s| s.slice(window, options.inclusive_end))
        .collect();

    let timing_quality = if decoded.timing_quality.is_empty() {
        None
    } else {
        Some(decoded.timing_quality.iter().sum::<f64>() / decoded.timing_quality.len() as f64)
    };

    (sliced, decoded.flags, timing_quality)
}

/// Merge time-sorted segments that are exactly contiguous
///
/// Continuity tolerance is half a sample period. The remote path needs this
/// because each day arrives from a separate call; a decoder fed one
/// concatenated buffer has already done it.
pub fn merge_contiguous(segments: Vec<WaveformSegment>) -> Vec<WaveformSegment> {
    let mut out: Vec<WaveformSegment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match out.last_mut() {
            Some(prev) if prev.sample_rate == seg.sample_rate && prev.sample_rate > 0.0 => {
                let tol = (0.5e6 / prev.sample_rate) as i64;
                let contiguous = (seg.start - prev.end_time())
                    .num_microseconds()
                    .map(|d| d.abs() <= tol)
                    .unwrap_or(false);
                if contiguous {
                    prev.samples.extend(seg.samples);
                } else {
                    out.push(seg);
                }
            }
            _ => out.push(seg),
        }
    }
    out
}
