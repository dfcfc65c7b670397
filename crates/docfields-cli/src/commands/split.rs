//! Split command - one PDF per page.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;

use docfields_core::backend::{LopdfSplitter, PageSplitter};
use docfields_core::models::Record;
use docfields_core::{FileError, FileFailure, InputKind, discover};

use super::{print_summary, run_batch, timestamped};

/// Arguments for the split command.
#[derive(Args)]
pub struct SplitArgs {
    /// Directory scanned recursively for PDF files
    input_dir: PathBuf,

    /// Output directory; defaults to split_pdfs_<time>
    output_dir: Option<PathBuf>,

    /// Number of concurrent worker groups
    #[arg(short = 'n', long, default_value = "1")]
    concurrency: usize,
}

/// Directory for the pages of `file`, mirroring its place under `input_dir`
/// so equal stems in different subdirectories do not collide.
fn page_dir(input_dir: &Path, file: &Path, output_dir: &Path) -> PathBuf {
    let relative = file
        .parent()
        .and_then(|parent| parent.strip_prefix(input_dir).ok())
        .unwrap_or_else(|| Path::new(""));
    output_dir.join(relative)
}

fn split_file(file: &Path, input_dir: &Path, output_dir: &Path) -> Result<Record, FileFailure> {
    let target = page_dir(input_dir, file, output_dir);
    fs::create_dir_all(&target).map_err(FileError::from)?;
    let pages = LopdfSplitter.split(file, &target).map_err(|e| FileError::Split {
        file: file.display().to_string(),
        reason: e.to_string(),
    })?;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut record = Record::new(name);
    record.insert("pages", pages.len().to_string());
    Ok(record)
}

pub async fn run(args: SplitArgs) -> anyhow::Result<()> {
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
        .unwrap_or_else(|| PathBuf::from(timestamped("split_pdfs", "%Y_%m_%d_%H_%M_%S")));
    fs::create_dir_all(&output_dir)?;

    println!(
        "{} Found {} PDF files to split",
        style("ℹ").blue(),
        files.len()
    );

    let target = output_dir.clone();
    let input_dir = args.input_dir.clone();
    let report = run_batch(&files, args.concurrency, move |file: &PathBuf| {
        split_file(file, &input_dir, &target)
    })
    .await;

    print_summary("Split", files.len(), report.succeeded, &report.failures, start.elapsed());
    println!(
        "{} Pages written to {}",
        style("✓").green(),
        output_dir.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_dir_keeps_subdirectories_apart() {
        let input = Path::new("/data/in");
        let out = Path::new("/data/out");

        assert_eq!(page_dir(input, Path::new("/data/in/a.pdf"), out), PathBuf::from("/data/out"));
        assert_eq!(
            page_dir(input, Path::new("/data/in/2020/a.pdf"), out),
            PathBuf::from("/data/out/2020")
        );
        assert_ne!(
            page_dir(input, Path::new("/data/in/x/a.pdf"), out),
            page_dir(input, Path::new("/data/in/y/a.pdf"), out)
        );
    }
}
