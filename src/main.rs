/*!
 * Command-line interface for flattree
 */

use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use flattree::config::{Args, Command, ExpandArgs, FlattenArgs};
use flattree::{
    materialize, ExpandConfig, FlattenConfig, FlattenReport, Reporter, Result, Scanner,
    XmlReader, XmlWriter,
};

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut command = Args::command();
        clap_complete::generate(shell, &mut command, "flattree", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = flattree::logging::init_logging(args.debug) {
        eprintln!("Warning: {}", e);
    }

    let result = match args.command {
        Some(Command::Flatten(flatten_args)) => run_flatten(flatten_args),
        Some(Command::Expand(expand_args)) => run_expand(expand_args),
        None => {
            // Nothing to do; show usage
            if let Err(e) = Args::command().print_help() {
                eprintln!("Error: {}", e);
            }
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_flatten(args: FlattenArgs) -> Result<()> {
    let show_stats = args.stats;
    let show_progress = args.progress;

    // Create configuration
    let working_dir = std::env::current_dir()?;
    let config = FlattenConfig::from_args(args, &working_dir)?;

    // Validate configuration
    config.validate()?;
    debug!(mode = ?config.mode, "flattening");

    let progress = if show_progress {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} files {wide_msg:.dim.white}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.enable_steady_tick(Duration::from_millis(100));
        progress
    } else {
        ProgressBar::hidden()
    };

    let start_time = Instant::now();

    // Scan and encode
    let scanner = Scanner::with_progress(config.clone(), Arc::new(progress.clone()))?;
    let (document, statistics) = scanner.scan_with_statistics()?;
    let bytes = XmlWriter::new(config.presentation).encode(&document)?;

    progress.finish_and_clear();

    config.output.write_all(&bytes)?;

    if show_stats {
        let report = FlattenReport {
            output: config.output.to_string(),
            duration: start_time.elapsed(),
            statistics,
        };
        Reporter::new().print_report(&report);
    }

    Ok(())
}

fn run_expand(args: ExpandArgs) -> Result<()> {
    let config = ExpandConfig::from_args(args);
    config.validate()?;

    let input = config.input.read_all()?;
    let document = XmlReader::new().decode(&input)?;
    let written = materialize(&document, &config.destination)?;

    debug!(files = written, destination = %config.destination.display(), "expanded");
    Ok(())
}
