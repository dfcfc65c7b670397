//! Extract command - fields from every document in a directory.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::warn;

use docfields_core::{
    AdHocFields, AdHocStrategy, Backends, ExtractMode, ExtractOptions, Extractor, FieldSet,
    Settings, TempRoot,
};

use super::{print_run_summary, spawn_interrupt_observer};
use crate::progress::GroupProgress;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Directory scanned recursively for PDF and image files
    input_dir: PathBuf,

    /// Output table (.csv or .xlsx)
    output: PathBuf,

    /// Ad-hoc fields: coord_<name>=<geometry> or reg_<name>=<regex>
    fields: Vec<String>,

    /// JSON field config; ad-hoc fields are ignored when set
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent worker groups
    #[arg(short = 'n', long, default_value = "1")]
    concurrency: usize,

    /// Ad-hoc: read every field by coordinates, retrying with OCR
    #[arg(long)]
    with_coordinate: bool,

    /// Ad-hoc: OCR every page and apply every pattern
    #[arg(long)]
    with_ocr: bool,

    /// Ad-hoc OCR: only read the first N pages (0 = all)
    #[arg(short, long, default_value = "0")]
    max_read_page: u32,

    /// Config mode: fail a file when all of its coordinate fields are blank
    #[arg(long)]
    strict_coordinates: bool,
}

fn build_mode(args: &ExtractArgs) -> anyhow::Result<ExtractMode> {
    if let Some(config) = &args.config {
        if !args.fields.is_empty() {
            warn!("Ignoring {} ad-hoc field arguments, using {}", args.fields.len(), config.display());
        }
        return Ok(ExtractMode::Config {
            fields: FieldSet::from_file(config)?,
            strict_coordinates: args.strict_coordinates,
        });
    }

    let fields = AdHocFields::parse(args.fields.as_slice())?;
    let strategy = AdHocStrategy::from_flags(args.with_coordinate, args.with_ocr, &fields);
    Ok(ExtractMode::AdHoc {
        fields,
        strategy,
        max_read_page: args.max_read_page,
    })
}

pub async fn run(args: ExtractArgs, settings: &Settings) -> anyhow::Result<()> {
    let mode = build_mode(&args)?;
    let backends = Backends::from_settings(settings)?;

    let root = TempRoot::new(settings.temp_parent());
    spawn_interrupt_observer(root.clone());

    let extractor = Extractor::new(
        ExtractOptions {
            input_dir: args.input_dir,
            output: args.output,
            concurrency: args.concurrency,
        },
        mode,
        backends,
        root,
    );
    extractor.validate()?;

    println!(
        "{} Extracting {} fields from {}",
        style("ℹ").blue(),
        extractor.mode().columns().len(),
        extractor.options().input_dir.display()
    );

    let summary = extractor.run(Arc::new(GroupProgress::new())).await?;
    print_run_summary("Processed", &summary);
    summary.ensure_rows()?;

    Ok(())
}
