//! Linktopdf command - print a list of links to PDF files.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;

use docfields_core::backend::{HttpDownload, RenderTool, page_renderer};
use docfields_core::links::ensure_links;
use docfields_core::models::Record;
use docfields_core::{FileFailure, LinkOutput, LinkPrinter, Settings, archive_pdfs, read_links};

use super::{print_summary, run_batch};

/// Arguments for the linktopdf command.
#[derive(Args)]
pub struct LinkToPdfArgs {
    /// Link list: .csv or .xlsx (first column) or .txt (one link per line)
    input: PathBuf,

    /// Output directory, or the .zip path used with --zip
    #[arg(default_value = ".")]
    output: PathBuf,

    /// Number of concurrent worker groups
    #[arg(short = 'n', long, default_value = "1")]
    concurrency: usize,

    /// Pack the PDFs into a zip archive and remove the PDF directory
    #[arg(short, long)]
    zip: bool,

    /// Page printer: chromium or wkhtmltopdf
    #[arg(short = 't', long = "tool", default_value = "chromium")]
    tool: RenderTool,
}

pub async fn run(args: LinkToPdfArgs, settings: &Settings) -> anyhow::Result<()> {
    let start = Instant::now();
    if args.concurrency == 0 {
        anyhow::bail!("Concurrency must be at least 1");
    }

    let links = read_links(&args.input)?;
    ensure_links(&links, &args.input)?;

    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    let layout = LinkOutput::resolve(&args.output, &stamp);
    fs::create_dir_all(&layout.pdf_dir)?;

    println!(
        "{} Found {} links, printing with {}",
        style("ℹ").blue(),
        links.len(),
        args.tool
    );

    let printer = LinkPrinter::new(
        page_renderer(args.tool, settings),
        Arc::new(HttpDownload::new(settings.command_timeout())),
    );
    let target = layout.pdf_dir.clone();
    let report = run_batch(&links, args.concurrency, move |link: &String| -> Result<Record, FileFailure> {
        let pdf = printer.print(link, &target)?;
        let mut record = Record::new(link.clone());
        record.insert("pdf", pdf.display().to_string());
        Ok(record)
    })
    .await;

    print_summary("Printed", links.len(), report.succeeded, &report.failures, start.elapsed());
    println!(
        "{} PDFs written to {}",
        style("✓").green(),
        layout.pdf_dir.display()
    );

    if args.zip {
        let archived = archive_pdfs(&layout.pdf_dir, &layout.archive)?;
        println!(
            "{} Archived {} PDFs into {}",
            style("✓").green(),
            archived.files,
            layout.archive.display()
        );
        if !archived.duplicates.is_empty() {
            println!(
                "{} Identical content: {}",
                style("⚠").yellow(),
                archived.duplicates.join(", ")
            );
        }
    }

    Ok(())
}
