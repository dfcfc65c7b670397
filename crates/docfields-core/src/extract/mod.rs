//! Batch extraction: discover, partition, dispatch, aggregate.

pub mod adhoc;
pub mod engine;
pub mod purify;
pub mod resource;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

pub use adhoc::{AdHocExtractor, AdHocStrategy};
pub use engine::{FieldOutcome, SingleFileExtractor};
pub use purify::{is_blank, purify};
pub use resource::{PageResource, PageResources};

use crate::backend::Backends;
use crate::dispatch::{FileFailure, ProgressObserver, dispatch};
use crate::error::{ConfigError, DocfieldsError, FileError, Result};
use crate::input::discover;
use crate::lifecycle::TempRoot;
use crate::models::{AdHocFields, CodeKind, FieldSet, Record};
use crate::output::{TableFormat, batch_output_path, write_records};
use crate::partition::partition;

/// How fields are described for a run.
#[derive(Debug)]
pub enum ExtractMode {
    /// Ordered per-field rules from a config file.
    Config {
        fields: FieldSet,
        /// Fail a file when all of its coordinate fields are blank.
        strict_coordinates: bool,
    },
    /// `coord_`/`reg_` arguments with one global method.
    AdHoc {
        fields: AdHocFields,
        strategy: AdHocStrategy,
        max_read_page: u32,
    },
    /// One decoded code per file, without crop fallback.
    Scan { fields: FieldSet },
}

impl ExtractMode {
    pub fn scan(code: CodeKind) -> Self {
        ExtractMode::Scan {
            fields: FieldSet::scan(code),
        }
    }

    /// Table columns after `file_name`.
    pub fn columns(&self) -> Vec<String> {
        match self {
            ExtractMode::Config { fields, .. } | ExtractMode::Scan { fields } => fields.columns(),
            ExtractMode::AdHoc { fields, .. } => fields.columns(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    /// Number of worker groups, clamped to the file count.
    pub concurrency: usize,
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    /// `(file, reason)` per failed file, sorted.
    pub failures: Vec<(String, String)>,
    pub elapsed: Duration,
    /// Written table, absent when no rows were gathered.
    pub output: Option<PathBuf>,
    pub rows: usize,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Error when the run gathered nothing to write.
    pub fn ensure_rows(&self) -> Result<()> {
        if self.rows == 0 {
            return Err(DocfieldsError::EmptyResult);
        }
        Ok(())
    }
}

/// Runs one extraction over an input directory.
pub struct Extractor {
    options: ExtractOptions,
    mode: Arc<ExtractMode>,
    backends: Backends,
    temp_root: TempRoot,
}

impl Extractor {
    pub fn new(options: ExtractOptions, mode: ExtractMode, backends: Backends, temp_root: TempRoot) -> Self {
        Self {
            options,
            mode: Arc::new(mode),
            backends,
            temp_root,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn mode(&self) -> &ExtractMode {
        &self.mode
    }

    /// Check run options before any file is touched.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.options.input_dir.is_dir() {
            return Err(ConfigError::InputDir(self.options.input_dir.clone()));
        }
        TableFormat::from_path(&self.options.output)?;
        if self.options.concurrency == 0 {
            return Err(ConfigError::Concurrency);
        }
        Ok(())
    }

    /// Final table path. Config runs apply the batch naming rule.
    pub fn output_path(&self) -> PathBuf {
        match self.mode.as_ref() {
            ExtractMode::Config { .. } => batch_output_path(&self.options.input_dir, &self.options.output),
            ExtractMode::AdHoc { .. } | ExtractMode::Scan { .. } => self.options.output.clone(),
        }
    }

    /// Process every input file and write the gathered rows.
    ///
    /// The temp root is removed when this returns, whether or not it
    /// succeeded. Per-file failures are reported in the summary; the table is
    /// written whenever at least one row was gathered.
    pub async fn run(&self, progress: Arc<dyn ProgressObserver>) -> Result<RunSummary> {
        self.validate()?;
        let _cleanup = self.temp_root.guard();
        let started = Instant::now();

        let files = discover(&self.options.input_dir)?;
        if files.is_empty() {
            return Err(DocfieldsError::NoInputFiles(self.options.input_dir.clone()));
        }

        let groups = partition(&files, self.options.concurrency);
        info!(
            "Processing {} files in {} groups from {:?}",
            files.len(),
            groups.len(),
            self.options.input_dir
        );

        let worker = file_worker(
            Arc::clone(&self.mode),
            self.backends.clone(),
            self.temp_root.clone(),
        );
        let report = dispatch(groups, Arc::new(worker), progress).await;

        let rows = report.records.len();
        let output = if rows > 0 {
            let path = self.output_path();
            let columns = self.mode.columns();
            write_records(&path, &columns, report.records.into_values().collect())?;
            Some(path)
        } else {
            warn!("No rows gathered, skipping output");
            None
        };

        Ok(RunSummary {
            total: files.len(),
            succeeded: report.succeeded,
            failures: report.failures,
            elapsed: started.elapsed(),
            output,
            rows,
        })
    }
}

/// Per-file work. Each file gets its own scratch directory, removed when the
/// file is done.
fn file_worker(
    mode: Arc<ExtractMode>,
    backends: Backends,
    temp_root: TempRoot,
) -> impl Fn(&PathBuf) -> std::result::Result<Record, FileFailure> + Send + Sync + 'static {
    move |file: &PathBuf| -> std::result::Result<Record, FileFailure> {
        let scratch = temp_root.scratch_dir().map_err(FileError::from)?;
        match mode.as_ref() {
            ExtractMode::Config {
                fields,
                strict_coordinates,
            } => SingleFileExtractor::new(file, fields, &backends, scratch.path())
                .and_then(|e| e.strict_coordinates(*strict_coordinates).run())
                .map_err(FileFailure::from),
            ExtractMode::AdHoc {
                fields,
                strategy,
                max_read_page,
            } => AdHocExtractor::new(fields, &backends, *strategy, *max_read_page)
                .extract(file, scratch.path()),
            ExtractMode::Scan { fields } => SingleFileExtractor::new(file, fields, &backends, scratch.path())
                .and_then(SingleFileExtractor::run)
                .map_err(FileFailure::from),
        }
    }
}
