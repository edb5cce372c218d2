//! Typed metric-set registry
//!
//! Maps each supported metric set to its stream requirements and output
//! shape, validated at configuration-load time rather than discovered by
//! string lookups at call time. The engine hands streams to a
//! `MetricCalculator` and receives result rows it never inspects.

use crate::app::models::{MetricResult, Stream};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Supported metric sets (closed enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricSet {
    /// Basic per-stream statistics: mean, median, min, max, rms
    BasicStats,
    /// Gap and overlap counts within the requested window
    GapsAndAvailability,
    /// State-of-health flag summaries
    StateOfHealth,
    /// Power spectral density over one stream
    Psd,
    /// Cross-correlation between a channel and its neighbor
    Correlation,
    /// Orthogonal-component comparison (Z against N and E)
    Orientation,
}

impl MetricSet {
    pub fn all() -> &'static [MetricSet] {
        &[
            Self::BasicStats,
            Self::GapsAndAvailability,
            Self::StateOfHealth,
            Self::Psd,
            Self::Correlation,
            Self::Orientation,
        ]
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "basic-stats" => Ok(Self::BasicStats),
            "gaps" => Ok(Self::GapsAndAvailability),
            "soh" => Ok(Self::StateOfHealth),
            "psd" => Ok(Self::Psd),
            "correlation" => Ok(Self::Correlation),
            "orientation" => Ok(Self::Orientation),
            other => Err(Error::configuration(format!("unknown metric set '{other}'"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BasicStats => "basic-stats",
            Self::GapsAndAvailability => "gaps",
            Self::StateOfHealth => "soh",
            Self::Psd => "psd",
            Self::Correlation => "correlation",
            Self::Orientation => "orientation",
        }
    }
}

/// Shape of a metric set's output rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// One numeric value per stream per window
    ScalarPerWindow,
    /// Several named values per stream per window
    MultiValue,
    /// A spectrum (frequency, value) series
    Spectrum,
}

/// Business-logic category a metric set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Simple,
    SpectralDensity,
    CrossChannel,
}

/// Requirements and shape of one metric set
#[derive(Debug, Clone, Copy)]
pub struct MetricSetSpec {
    /// Number of simultaneously resolved streams the calculator needs
    pub streams_required: usize,
    pub output_shape: OutputShape,
    pub category: Category,
}

/// The full registry, keyed by metric set
pub fn registry() -> BTreeMap<MetricSet, MetricSetSpec> {
    use Category::*;
    use MetricSet::*;
    use OutputShape::*;

    BTreeMap::from([
        (
            BasicStats,
            MetricSetSpec {
                streams_required: 1,
                output_shape: MultiValue,
                category: Simple,
            },
        ),
        (
            GapsAndAvailability,
            MetricSetSpec {
                streams_required: 1,
                output_shape: MultiValue,
                category: Simple,
            },
        ),
        (
            StateOfHealth,
            MetricSetSpec {
                streams_required: 1,
                output_shape: MultiValue,
                category: Simple,
            },
        ),
        (
            Psd,
            MetricSetSpec {
                streams_required: 1,
                output_shape: Spectrum,
                category: SpectralDensity,
            },
        ),
        (
            Correlation,
            MetricSetSpec {
                streams_required: 2,
                output_shape: ScalarPerWindow,
                category: CrossChannel,
            },
        ),
        (
            Orientation,
            MetricSetSpec {
                streams_required: 3,
                output_shape: MultiValue,
                category: CrossChannel,
            },
        ),
    ])
}

/// Validate a configured list of metric sets at load time
///
/// Every set must be present in the registry and listed at most once.
pub fn validate_sets(sets: &[MetricSet]) -> Result<()> {
    let known = registry();
    let mut seen = std::collections::HashSet::new();
    for set in sets {
        if !known.contains_key(set) {
            return Err(Error::configuration(format!(
                "metric set {} is not registered",
                set.name()
            )));
        }
        if !seen.insert(*set) {
            return Err(Error::configuration(format!(
                "metric set {} listed more than once",
                set.name()
            )));
        }
    }
    Ok(())
}

/// Boundary with the metric computation library
///
/// The engine resolves and fetches streams; the calculator turns them into
/// result rows. Results flow back opaquely.
pub trait MetricCalculator {
    fn metric_set(&self) -> MetricSet;

    /// Compute metrics over the streams for one window
    ///
    /// `streams.len()` equals the registered `streams_required` for this
    /// calculator's set; the engine enforces that before calling.
    fn compute(&self, streams: &[Stream]) -> Result<Vec<MetricResult>>;
}
