//! Data models: field configuration, settings and per-file records.

pub mod config;
pub mod record;
pub mod settings;

pub use config::{
    AdHocFields, CodeKind, CropBox, FieldConfig, FieldMethod, FieldSet, RawFieldConfig,
    TextSource,
};
pub use record::Record;
pub use settings::Settings;
