//! Error types for the docfields-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the docfields library.
#[derive(Error, Debug)]
pub enum DocfieldsError {
    /// Configuration error. Fatal, raised before any file is processed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single file could not be processed.
    #[error("file error: {0}")]
    File(#[from] FileError),

    /// An external capability failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Input discovery found nothing to do.
    #[error("no input files found under {0}")]
    NoInputFiles(PathBuf),

    /// Every file failed; there is nothing to write.
    #[error("extraction produced no rows")]
    EmptyResult,

    /// A link list contained no links.
    #[error("no links found in {0}")]
    NoLinks(PathBuf),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// CSV writer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet writer error.
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Spreadsheet reader error.
    #[error("xlsx read error: {0}")]
    Sheet(#[from] calamine::XlsxError),

    /// Archive writer error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors found while loading or validating field configuration and run options.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not a valid JSON array of field records.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The config contains no fields.
    #[error("no fields configured")]
    Empty,

    /// Two fields share an output column.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),

    /// A field value is missing or malformed.
    #[error("field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The regex for a field does not compile.
    #[error("field {field}: invalid pattern: {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// An ad-hoc `coord_`/`reg_` argument is not `name=value`.
    #[error("malformed field argument: {0}")]
    MalformedArgument(String),

    /// Neither a config file nor ad-hoc arguments were supplied.
    #[error("no extraction arguments supplied")]
    NoArguments,

    /// Input directory is missing or not a directory.
    #[error("input directory does not exist: {0}")]
    InputDir(PathBuf),

    /// Output extension does not select a table writer.
    #[error("output must be a .csv or .xlsx file: {0}")]
    OutputFormat(PathBuf),

    /// Link list is missing or has an unsupported extension.
    #[error("link list must be an existing .csv, .xlsx or .txt file: {0}")]
    LinkList(PathBuf),

    /// Concurrency must be at least one.
    #[error("concurrency must be at least 1")]
    Concurrency,
}

/// Hard errors that invalidate processing of a whole file.
#[derive(Error, Debug)]
pub enum FileError {
    /// A field references a page the document does not have.
    #[error("page {page} does not exist in {file}")]
    MissingPage { page: u32, file: String },

    /// Splitting the document into pages failed.
    #[error("failed to split {file}: {reason}")]
    Split { file: String, reason: String },

    /// The file extension is not an accepted input type.
    #[error("unsupported input file: {0}")]
    Unsupported(String),

    /// Rasterizing a page for the crop fallback failed.
    #[error("failed to rasterize page {page}: {source}")]
    Rasterize {
        page: u32,
        #[source]
        source: BackendError,
    },

    /// Cropping or decoding an image failed outright.
    #[error("failed to decode image {path}: {reason}")]
    Image { path: PathBuf, reason: String },

    /// Every coordinate field on the file came back blank.
    #[error("coordinate extraction yielded no text")]
    CoordinatesBlank,

    /// Coordinate extraction and the OCR retry both failed.
    #[error("coordinate and OCR extraction failed: {0}")]
    NoStrategySucceeded(String),

    /// A whole-file tool run failed.
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// The worker processing this file panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// I/O error on a per-file temp artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of external capabilities (tools, parsers, decoders).
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// The executable could not be started.
    #[error("failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The executable exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    /// The executable exceeded its time budget and was killed.
    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    /// The tool ran but its output could not be read.
    #[error("failed to read output of {program}: {reason}")]
    Output { program: String, reason: String },

    /// The capability does not apply to this kind of input.
    #[error("{backend} does not support {path}")]
    Unsupported { backend: String, path: PathBuf },

    /// An in-process engine failed.
    #[error("{backend}: {reason}")]
    Engine { backend: String, reason: String },
}

/// Result type for the docfields library.
pub type Result<T> = std::result::Result<T, DocfieldsError>;
