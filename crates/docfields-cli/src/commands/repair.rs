//! Repair command - rewrite damaged PDFs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, warn};

use docfields_core::backend::{MutoolClean, PdfRepairer, ToolCommand};
use docfields_core::models::Record;
use docfields_core::{FileError, FileFailure, InputKind, Settings, discover};

use super::{print_summary, run_batch, timestamped};

/// Arguments for the repair command.
#[derive(Args)]
pub struct RepairArgs {
    /// Directory scanned recursively for PDF files
    input_dir: PathBuf,

    /// Output directory; defaults to <input_dir>_repaired_<time>
    output_dir: Option<PathBuf>,

    /// Number of concurrent worker groups
    #[arg(short = 'n', long, default_value = "1")]
    concurrency: usize,
}

fn default_output_dir(input_dir: &Path) -> PathBuf {
    let name = input_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdfs".to_string());
    input_dir.with_file_name(timestamped(&format!("{name}_repaired"), "%Y%m%d%H%M%S"))
}

fn contains_pdf(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| InputKind::from_path(&e.path()) == Some(InputKind::Pdf))
        })
        .unwrap_or(false)
}

pub async fn run(args: RepairArgs, settings: &Settings) -> anyhow::Result<()> {
    let start = Instant::now();
    if args.concurrency == 0 {
        anyhow::bail!("Concurrency must be at least 1");
    }

    let files: Vec<PathBuf> = discover(&args.input_dir)?
        .into_iter()
        .filter(|p| InputKind::from_path(p) == Some(InputKind::Pdf))
        .collect();
    if files.is_empty() {
        anyhow::bail!("No PDF files found in {}", args.input_dir.display());
    }

    let output_dir = args
        .output_dir
        .unwrap_or_else(|| default_output_dir(&args.input_dir));
    fs::create_dir_all(&output_dir)?;

    println!(
        "{} Found {} PDF files to repair",
        style("ℹ").blue(),
        files.len()
    );

    let repairer = Arc::new(MutoolClean::new(ToolCommand::new(
        &settings.tools.mutool,
        settings.command_timeout(),
    )));
    let target = output_dir.clone();
    let report = run_batch(&files, args.concurrency, move |file: &PathBuf| -> Result<Record, FileFailure> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        repairer
            .repair(file, &target.join(&name))
            .map_err(FileError::from)?;
        Ok(Record::new(name))
    })
    .await;

    print_summary("Repaired", files.len(), report.succeeded, &report.failures, start.elapsed());

    if contains_pdf(&output_dir) {
        println!(
            "{} Repaired files written to {}",
            style("✓").green(),
            output_dir.display()
        );
    } else {
        debug!("Removing empty output directory {}", output_dir.display());
        if let Err(e) = fs::remove_dir_all(&output_dir) {
            warn!("Failed to remove {}: {}", output_dir.display(), e);
        }
    }

    Ok(())
}
