//! compile-palette - palette textures and structural diffs for a style set
//!
//! Rewrites each input in place, writes one palette PNG per input, a pairwise
//! diff report and a run manifest. Prints a JSON summary to stdout.
//! Returns non-zero on any fatal condition.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use stylepalette_core::{PaletteConfig, PalettePipeline, RunOptions};

#[derive(Parser)]
#[command(name = "compile-palette")]
#[command(about = "Style Palette Compiler - color indirection textures for map style sets")]
struct Cli {
    /// Style documents, in palette column order
    #[arg(required = true)]
    documents: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the pairwise diff report
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Skip the structural comparison
    #[arg(long)]
    no_compare: bool,

    /// Run every stage including verification, write nothing
    #[arg(long)]
    dry_run: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => match PaletteConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => PaletteConfig::default(),
    };

    let pipeline = PalettePipeline::new(config);
    let options = RunOptions {
        report: cli.report,
        compare: !cli.no_compare,
        dry_run: cli.dry_run,
    };

    match pipeline.run(&cli.documents, &options) {
        Ok(summary) => {
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
