//! Scan command - batch QR code / barcode decoding.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;

use docfields_core::{Backends, CodeKind, ExtractMode, ExtractOptions, Extractor, Settings, TempRoot};

use super::{print_run_summary, spawn_interrupt_observer, timestamped};
use crate::progress::GroupProgress;

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Directory scanned recursively for PDF and image files
    input_dir: PathBuf,

    /// Output table (.csv or .xlsx); defaults to output_<time>.csv
    output: Option<PathBuf>,

    /// Code type: qrcode or barcode128
    #[arg(short = 't', long = "type", default_value = "qrcode")]
    code_type: CodeKind,

    /// Number of concurrent worker groups
    #[arg(short = 'n', long, default_value = "1")]
    concurrency: usize,
}

pub async fn run(args: ScanArgs, settings: &Settings) -> anyhow::Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.csv", timestamped("output", "%Y%m%d_%H_%M_%S"))));

    let root = TempRoot::new(settings.temp_parent());
    spawn_interrupt_observer(root.clone());

    let extractor = Extractor::new(
        ExtractOptions {
            input_dir: args.input_dir,
            output,
            concurrency: args.concurrency,
        },
        ExtractMode::scan(args.code_type),
        Backends::from_settings(settings)?,
        root,
    );
    extractor.validate()?;

    println!(
        "{} Scanning {} for {} codes",
        style("ℹ").blue(),
        extractor.options().input_dir.display(),
        args.code_type
    );

    let summary = extractor.run(Arc::new(GroupProgress::new())).await?;
    print_run_summary("Scanned", &summary);
    summary.ensure_rows()?;

    Ok(())
}
