//! Core library for batch document field extraction.
//!
//! This crate provides:
//! - Field configuration (config-file and ad-hoc argument modes)
//! - Per-field extraction: region text, regex over cascading text sources,
//!   QR/barcode scan with crop fallback
//! - Per-file page cache shared by every field of a file
//! - Round-robin partitioning and panic-isolated concurrent dispatch
//! - CSV/XLSX result tables
//! - Temp directory lifecycle with interrupt cleanup
//! - Printing link lists to PDF

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod input;
pub mod lifecycle;
pub mod links;
pub mod models;
pub mod output;
pub mod partition;

pub use backend::Backends;
pub use dispatch::{BatchItem, DispatchReport, FileFailure, NoProgress, ProgressObserver, dispatch};
pub use error::{BackendError, ConfigError, DocfieldsError, FileError, Result};
pub use extract::{
    AdHocStrategy, ExtractMode, ExtractOptions, Extractor, FieldOutcome, RunSummary,
    SingleFileExtractor,
};
pub use input::{InputKind, discover};
pub use lifecycle::{TempRoot, termination_signal, watch_interrupt};
pub use links::{LinkOutput, LinkPrinter, archive_pdfs, read_links};
pub use models::{AdHocFields, CodeKind, FieldConfig, FieldMethod, FieldSet, Record, Settings};
pub use partition::partition;
