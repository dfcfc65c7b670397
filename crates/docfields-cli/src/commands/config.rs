//! Config command - field configs and tool settings.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use docfields_core::models::RawFieldConfig;
use docfields_core::{FieldSet, Settings};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Validate a field config file and show its columns
    Check {
        /// Field config (JSON array)
        file: PathBuf,
    },

    /// Write a sample field config
    Init(InitArgs),

    /// Show the effective tool settings
    Settings,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for the field config
    #[arg(short, long, default_value = "fields.json")]
    output: PathBuf,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, settings: &Settings) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Check { file } => check_config(&file),
        ConfigCommand::Init(init_args) => init_config(init_args),
        ConfigCommand::Settings => show_settings(settings),
    }
}

fn check_config(file: &Path) -> anyhow::Result<()> {
    let fields = FieldSet::from_file(file)?;

    println!(
        "{} {} is valid ({} fields)",
        style("✓").green(),
        file.display(),
        fields.fields().len()
    );
    for field in fields.fields() {
        println!(
            "  {:<20} page {:<3} {}",
            field.name,
            field.page,
            field.method.name()
        );
    }
    if fields.needs_split() {
        println!(
            "{} Fields read past page 1; documents will be split per page.",
            style("ℹ").blue()
        );
    }

    Ok(())
}

fn sample_config() -> Vec<RawFieldConfig> {
    vec![
        RawFieldConfig {
            field_name: "ticket_no".to_string(),
            page_num: 1,
            extract_method: "tet".to_string(),
            tet_coordinates: vec!["50 700 300 720".to_string()],
            ..Default::default()
        },
        RawFieldConfig {
            field_name: "issue_date".to_string(),
            page_num: 1,
            extract_method: "reg".to_string(),
            text_extract_tool: Some(vec![
                "pdftotext".to_string(),
                "unipdf".to_string(),
                "ocr".to_string(),
            ]),
            reg_exp: r"(\d{4}-\d{2}-\d{2})".to_string(),
            ..Default::default()
        },
        RawFieldConfig {
            field_name: "qr".to_string(),
            page_num: 2,
            extract_method: "scan".to_string(),
            crop_coordinates: vec![0, 0, 400, 400],
            code_type: "qrcode".to_string(),
            ..Default::default()
        },
    ]
}

fn init_config(args: InitArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            args.output.display()
        );
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let sample = sample_config();
    FieldSet::from_raw(&sample)?;
    fs::write(&args.output, serde_json::to_string_pretty(&sample)?)?;

    println!(
        "{} Created field config at {}",
        style("✓").green(),
        args.output.display()
    );

    Ok(())
}

fn show_settings(settings: &Settings) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
