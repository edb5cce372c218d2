//! Waveform codec boundary
//!
//! Decoding binary sample containers is an external collaborator's job; the
//! fetch engine only needs the `WaveformCodec` seam. A reference codec for a
//! simple record-per-line text container is included so the pipeline can be
//! exercised end to end; production deployments plug a miniSEED decoder in
//! behind the same trait.

use crate::app::models::{ChannelIdentifier, FlagCounts, WaveformSegment};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// The decoded contents of one waveform container
#[derive(Debug, Clone, Default)]
pub struct DecodedWaveform {
    /// Raw segments in container order, not yet sorted or sliced
    pub segments: Vec<WaveformSegment>,
    /// State-of-health flag bit counts aggregated over all records
    pub flags: FlagCounts,
    /// Per-record timing quality values, where the container carries them
    pub timing_quality: Vec<f64>,
}

/// Decoder from raw container bytes to segments plus quality annotations
pub trait WaveformCodec {
    fn decode(&self, bytes: &[u8], id: &ChannelIdentifier) -> Result<DecodedWaveform>;
}

/// Reference codec for the record-per-block text container
///
/// Each record is a header line `>> <start> <rate> <quality> [act io dq [tq]]`
/// followed by one line of whitespace-separated samples. Records that are
/// exactly contiguous with the previous one are merged into a single
/// segment, so a buffer built by concatenating consecutive day files decodes
/// into one continuous segment.
#[derive(Debug, Default)]
pub struct TextWaveformCodec;

impl TextWaveformCodec {
    /// Half a sample period, the tolerance for record continuity
    fn contiguous(prev: &WaveformSegment, next_start: DateTime<Utc>) -> bool {
        if prev.sample_rate <= 0.0 {
            return false;
        }
        let tol = (0.5e6 / prev.sample_rate) as i64;
        (next_start - prev.end_time())
            .num_microseconds()
            .map(|d| d.abs() <= tol)
            .unwrap_or(false)
    }
}

impl WaveformCodec for TextWaveformCodec {
    fn decode(&self, bytes: &[u8], id: &ChannelIdentifier) -> Result<DecodedWaveform> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::decode(id.sncl_id(), "container is not valid UTF-8"))?;

        let mut decoded = DecodedWaveform::default();
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        while let Some(header) = lines.next() {
            let header = header.trim();
            let Some(rest) = header.strip_prefix(">>") else {
                return Err(Error::decode(
                    id.sncl_id(),
                    format!("expected record header, found '{header}'"),
                ));
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(Error::decode(id.sncl_id(), "record header too short"));
            }

            let start: DateTime<Utc> = fields[0]
                .parse()
                .map_err(|_| Error::decode(id.sncl_id(), format!("bad start '{}'", fields[0])))?;
            let sample_rate: f64 = fields[1]
                .parse()
                .map_err(|_| Error::decode(id.sncl_id(), format!("bad rate '{}'", fields[1])))?;
            let quality = fields[2].chars().next();

            if fields.len() >= 6 {
                let parse_bits = |s: &str| {
                    s.parse::<u8>()
                        .map_err(|_| Error::decode(id.sncl_id(), format!("bad flag field '{s}'")))
                };
                let (act, io, dq) = (
                    parse_bits(fields[3])?,
                    parse_bits(fields[4])?,
                    parse_bits(fields[5])?,
                );
                for bit in 0..8 {
                    decoded.flags.activity[bit] += u64::from(act >> bit & 1);
                    decoded.flags.io_clock[bit] += u64::from(io >> bit & 1);
                    decoded.flags.data_quality[bit] += u64::from(dq >> bit & 1);
                }
            }
            if fields.len() >= 7 {
                if let Ok(tq) = fields[6].parse::<f64>() {
                    decoded.timing_quality.push(tq);
                }
            }

            let sample_line = lines
                .next()
                .ok_or_else(|| Error::decode(id.sncl_id(), "record has no sample line"))?;
            let samples: Vec<f64> = sample_line
                .split_whitespace()
                .map(|s| {
                    s.parse::<f64>()
                        .map_err(|_| Error::decode(id.sncl_id(), format!("bad sample '{s}'")))
                })
                .collect::<Result<_>>()?;

            match decoded.segments.last_mut() {
                Some(prev)
                    if prev.sample_rate == sample_rate
                        && Self::contiguous(prev, start) =>
                {
                    prev.samples.extend(samples);
                }
                _ => decoded.segments.push(WaveformSegment {
                    id: id.clone(),
                    quality,
                    start,
                    sample_rate,
                    samples,
                }),
            }
        }

        Ok(decoded)
    }
}
