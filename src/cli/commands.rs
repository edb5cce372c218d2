//! Command implementations for the SNCL expediter CLI
//!
//! Contains the command execution logic, result reporting, and the
//! per-channel error handling that keeps a recoverable failure on one
//! channel from aborting the rest of a fetch batch.

use crate::app::models::{AvailabilityTable, ChannelIdentifier, Stream};
use crate::app::services::fetch::codec::TextWaveformCodec;
use crate::cli::args::{Args, AvailabilityArgs, Commands, FetchArgs};
use crate::{Expediter, Result};
use colored::Colorize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fetch batch statistics for reporting
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    /// Channels the availability query matched
    pub channels_matched: usize,
    /// Streams fetched successfully
    pub streams_fetched: usize,
    /// Channels skipped on a recoverable error
    pub channels_skipped: usize,
    /// Total samples across all fetched streams
    pub samples_fetched: usize,
    /// Wall-clock batch time
    pub elapsed: std::time::Duration,
}

/// Main command dispatcher
pub fn run(args: Args) -> Result<()> {
    match args.get_command() {
        Commands::Availability(args) => run_availability(args),
        Commands::Fetch(args) => run_fetch(args).map(|_| ()),
    }
}

/// Resolve availability and print the matching channel epochs
fn run_availability(args: AvailabilityArgs) -> Result<()> {
    setup_logging(args.get_log_level())?;
    debug!("availability arguments: {:?}", args);

    let config = args.source.to_config()?;
    let window = args.window.to_window()?;
    let radius = args.radius.to_filter()?;

    let mut expediter = Expediter::new(config, Box::new(TextWaveformCodec))?;
    let table = expediter.get_availability(&args.patterns, &window, radius.as_ref())?;

    print_availability(&table);
    Ok(())
}

/// Fetch a waveform stream for every channel the patterns match
///
/// Recoverable conditions (no data, ambiguous epochs, a transiently failing
/// backend) skip the affected channel and are reported in the summary; only
/// configuration errors abort the batch.
fn run_fetch(args: FetchArgs) -> Result<FetchSummary> {
    setup_logging(args.get_log_level())?;
    debug!("fetch arguments: {:?}", args);

    let start_time = Instant::now();
    let config = args.to_config()?;
    let window = args.window.to_window()?;
    let radius = args.radius.to_filter()?;

    let mut expediter = Expediter::new(config, Box::new(TextWaveformCodec))?;
    let options = expediter.default_fetch_options();

    let table = match expediter.get_availability(&args.patterns, &window, radius.as_ref()) {
        Ok(table) => table,
        Err(e) if e.is_recoverable() => {
            warn!("{}", e);
            println!("{}", "No channels matched the request.".yellow());
            return Ok(FetchSummary {
                elapsed: start_time.elapsed(),
                ..Default::default()
            });
        }
        Err(e) => return Err(e),
    };

    // one fetch per channel, in availability order
    let mut channels: Vec<ChannelIdentifier> = Vec::new();
    for record in &table.records {
        if !channels.iter().any(|c| c.sncl_id() == record.sncl_id) {
            channels.push(record.id.clone());
        }
    }
    info!("fetching {} channel(s) over {}", channels.len(), window);

    let mut summary = FetchSummary {
        channels_matched: channels.len(),
        ..Default::default()
    };

    for id in &channels {
        match expediter.get_waveform(id, &window, &options) {
            Ok(stream) => {
                summary.streams_fetched += 1;
                summary.samples_fetched += stream.sample_count();
                print_stream(&stream);
            }
            Err(e) if e.is_recoverable() => {
                summary.channels_skipped += 1;
                warn!("skipping {}: {}", id, e);
                println!("  {} {} ({})", "skipped".yellow(), id, e);
            }
            Err(e) => return Err(e),
        }
    }

    summary.elapsed = start_time.elapsed();
    print_fetch_summary(&summary);
    Ok(summary)
}

/// Print the availability table as aligned columns
fn print_availability(table: &AvailabilityTable) {
    println!(
        "{}",
        format!(
            "{:<18} {:>9} {:>10} {:>7} {:<20} {:<20}",
            "SNCL", "Lat", "Lon", "Rate", "Start", "End"
        )
        .bright_green()
        .bold()
    );

    for record in &table.records {
        let coord = |v: Option<f64>| match v {
            Some(v) => format!("{v:.4}"),
            None => "-".to_string(),
        };
        let rate = match record.sample_rate {
            Some(rate) => format!("{rate:.1}"),
            None => "-".to_string(),
        };
        let end = match record.end_time {
            Some(end) => end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => "open".to_string(),
        };
        println!(
            "{:<18} {:>9} {:>10} {:>7} {:<20} {:<20}",
            record.sncl_id,
            coord(record.latitude),
            coord(record.longitude),
            rate,
            record.start_time.format("%Y-%m-%dT%H:%M:%S"),
            end
        );
    }

    println!();
    println!("{} channel epoch(s)", table.len().to_string().bright_cyan());
}

/// Print one fetched stream line
fn print_stream(stream: &Stream) {
    let continuity = if stream.is_gap_free() {
        "gap-free".green().to_string()
    } else {
        format!("{} segments", stream.segments.len()).yellow().to_string()
    };
    println!(
        "  {} {} {} samples, {}",
        "fetched".green(),
        stream.id,
        stream.sample_count(),
        continuity
    );
}

/// Print the batch summary
fn print_fetch_summary(summary: &FetchSummary) {
    println!();
    println!("{}", "Fetch complete".bright_green().bold());
    println!("  Channels matched: {}", summary.channels_matched);
    println!(
        "  Streams fetched:  {}",
        summary.streams_fetched.to_string().green()
    );
    if summary.channels_skipped > 0 {
        println!(
            "  Channels skipped: {}",
            summary.channels_skipped.to_string().yellow()
        );
    }
    println!("  Total samples:    {}", summary.samples_fetched);
    println!("  Elapsed:          {:.2?}", summary.elapsed);
}

/// Set up logging based on the command's verbosity flags
fn setup_logging(log_level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sncl_expediter={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    debug!("logging initialized at level: {}", log_level);
    Ok(())
}
