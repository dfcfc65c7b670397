//! CLI subcommands and shared helpers.

pub mod config;
pub mod extract;
pub mod linktopdf;
pub mod repair;
pub mod scan;
pub mod split;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use tracing::{debug, warn};

use docfields_core::lifecycle::{TempRoot, termination_signal, watch_interrupt};
use docfields_core::models::Record;
use docfields_core::{BatchItem, DispatchReport, FileFailure, RunSummary, Settings, dispatch, partition};

use crate::progress::GroupProgress;

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docfields")
        .join("settings.json")
}

/// Settings from `path`, else the user settings file, else defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    if let Some(path) = path {
        return Settings::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load settings from {}: {}", path.display(), e));
    }

    let default_path = default_settings_path();
    if default_path.exists() {
        debug!("Loading settings from {}", default_path.display());
        return Ok(Settings::from_file(&default_path)?);
    }
    Ok(Settings::default())
}

/// Remove `root` and exit with status 1 on the first termination signal.
pub fn spawn_interrupt_observer(root: TempRoot) {
    tokio::spawn(async move {
        watch_interrupt(root, async {
            if let Err(e) = termination_signal().await {
                warn!("Cannot listen for termination signals: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
        std::process::exit(1);
    });
}

/// Run `worker` over `items` in `concurrency` groups with progress bars.
pub async fn run_batch<T, F>(items: &[T], concurrency: usize, worker: F) -> DispatchReport
where
    T: BatchItem + Clone,
    F: Fn(&T) -> Result<Record, FileFailure> + Send + Sync + 'static,
{
    let groups = partition(items, concurrency);
    dispatch(groups, Arc::new(worker), Arc::new(GroupProgress::new())).await
}

/// Timestamped name for default outputs, e.g. `output_20240102_15_04_05`.
pub fn timestamped(prefix: &str, format: &str) -> String {
    format!("{}_{}", prefix, chrono::Local::now().format(format))
}

pub fn print_summary(action: &str, total: usize, succeeded: usize, failures: &[(String, String)], elapsed: Duration) {
    println!();
    println!(
        "{} {} {} files in {:?}",
        style("✓").green(),
        action,
        total,
        elapsed
    );
    println!(
        "   {} successful, {} failed",
        style(succeeded).green(),
        style(failures.len()).red()
    );

    if !failures.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for (file, reason) in failures {
            println!("  - {}: {}", file, reason);
        }
    }
}

pub fn print_run_summary(action: &str, summary: &RunSummary) {
    print_summary(action, summary.total, summary.succeeded, &summary.failures, summary.elapsed);
    if let Some(output) = &summary.output {
        println!(
            "{} Wrote {} rows to {}",
            style("✓").green(),
            summary.rows,
            output.display()
        );
    }
}
