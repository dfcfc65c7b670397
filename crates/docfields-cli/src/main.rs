//! CLI application for batch document field extraction.

mod commands;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, extract, linktopdf, repair, scan, split};

/// docfields - Extract configured fields from batches of PDFs and scans
#[derive(Parser)]
#[command(name = "docfields")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Debug logging (same as -vv)
    #[arg(long, global = true)]
    debug: bool,

    /// Path to tool settings file
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from every document in a directory into a table
    Extract(extract::ExtractArgs),

    /// Decode QR codes or barcodes from every document in a directory
    Scan(scan::ScanArgs),

    /// Split every PDF in a directory into single-page PDFs
    Split(split::SplitArgs),

    /// Repair damaged PDFs
    Repair(repair::RepairArgs),

    /// Print every link in a .csv, .xlsx or .txt list to PDF
    Linktopdf(linktopdf::LinkToPdfArgs),

    /// Check field configs and show settings
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match (cli.verbose, cli.debug) {
        (0, false) => Level::WARN,
        (1, false) => Level::INFO,
        (0..=2, _) => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    docfields_core::dispatch::install_panic_logging();

    let settings = commands::load_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::Extract(args) => extract::run(args, &settings).await,
        Commands::Scan(args) => scan::run(args, &settings).await,
        Commands::Split(args) => split::run(args).await,
        Commands::Repair(args) => repair::run(args, &settings).await,
        Commands::Linktopdf(args) => linktopdf::run(args, &settings).await,
        Commands::Config(args) => config::run(args, &settings).await,
    }
}
