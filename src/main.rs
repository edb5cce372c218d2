use clap::Parser;
use sncl_expediter::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match commands::run(args) {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("SNCL Expediter - Seismic Channel Availability and Waveform Fetch");
    println!("================================================================");
    println!();
    println!("Resolves which seismic channels have data for a time window, and fetches");
    println!("waveform streams stitched across day boundaries and sliced to the window.");
    println!();
    println!("USAGE:");
    println!("    sncl-expediter <COMMAND> [OPTIONS] <PATTERN>...");
    println!();
    println!("COMMANDS:");
    println!("    availability    Resolve channel epochs matching SNCL patterns");
    println!("    fetch           Fetch waveform streams for matching channels");
    println!("    help            Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # List channel epochs in a local archive:");
    println!("    sncl-expediter availability --archive /data/archive \\");
    println!("                                --start 2002-04-20 --end 2002-04-23 'US.OXF.*.BH?'");
    println!();
    println!("    # Fetch three days of waveforms, with station metadata from an inventory:");
    println!("    sncl-expediter fetch --archive /data/archive --inventory stations.txt \\");
    println!("                         --start 2002-04-20 --end 2002-04-23 US.OXF.--.BHZ");
    println!();
    println!("    # Query a remote metadata service within 15 degrees of a point:");
    println!("    sncl-expediter availability --metadata-url https://service.example.org/station \\");
    println!("                                --latitude 34.5 --longitude -89.4 --max-radius 15 \\");
    println!("                                --start 2002-04-20 --end 2002-04-21 '*.*.*.BHZ'");
    println!();
    println!("For detailed help on any command, use:");
    println!("    sncl-expediter <COMMAND> --help");
}
