use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, info, LevelFilter};

use gamedata_scanner::{generate_report, scan_with_config, ScanReport, ScannerConfig};

/// Batch scanner for gamedata config files
#[derive(Parser, Debug)]
#[clap(author, version, about = "Batch scanner for gamedata config files")]
struct Args {
    /// Input directory to scan for files
    #[clap(short, long, default_value = "./input")]
    input_dir: PathBuf,

    /// Output directory for reports
    #[clap(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// File extensions to process
    #[clap(long, value_delimiter = ',', default_values = &["cpp", "hpp", "h", "ext"])]
    file_extensions: Vec<String>,

    /// Number of worker threads (0 = number of logical CPUs)
    #[clap(short, long, default_value = "0")]
    threads: usize,

    /// Maximum number of files to process (0 = unlimited)
    #[clap(long, default_value = "0")]
    max_files: usize,

    /// Descend into subdirectories (pass `--recursive false` for a flat scan)
    #[clap(long, action = clap::ArgAction::Set, default_value_t = true)]
    recursive: bool,

    /// Verbosity level (0=error, 1=warn, 2=info, 3=debug, 4=trace)
    #[clap(short, long, default_value = "2")]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn run(args: &Args) -> Result<usize> {
    let config = ScannerConfig {
        file_extensions: args.file_extensions.clone(),
        threads: if args.threads == 0 {
            num_cpus::get()
        } else {
            args.threads
        },
        max_files: args.max_files,
        recursive: args.recursive,
    };

    let result = scan_with_config(&args.input_dir, &config)?;
    info!(
        "Scanned {} files, found {} classes",
        result.files_scanned, result.classes_found
    );

    let report = ScanReport::from_result(&result);
    generate_report(&args.output_dir, &report)?;

    Ok(result.files_with_errors)
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            error!("{failures} files failed to parse");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Scan failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
