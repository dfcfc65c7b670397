//! Ad-hoc extraction from `coord_`/`reg_` arguments.
//!
//! The method is chosen for the whole run: coordinate extraction with an
//! automatic OCR retry, or OCR followed by every pattern. Unlike config runs,
//! a failed file still yields whatever values were gathered.

use std::path::Path;

use tracing::debug;

use super::engine::first_capture;
use super::purify::is_blank;
use crate::backend::Backends;
use crate::dispatch::FileFailure;
use crate::error::{BackendError, FileError};
use crate::input::InputKind;
use crate::models::{AdHocFields, Record};

/// Global method of an ad-hoc run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdHocStrategy {
    /// Region text for every `coord_` field; OCR when that fails.
    Coordinate,
    /// OCR every page and apply every `reg_` pattern.
    Ocr,
}

impl AdHocStrategy {
    /// Resolve the legacy flags. Coordinate wins when both are set; with
    /// neither, the kind of supplied arguments decides.
    pub fn from_flags(with_coordinate: bool, with_ocr: bool, fields: &AdHocFields) -> Self {
        match (with_coordinate, with_ocr) {
            (true, _) => AdHocStrategy::Coordinate,
            (false, true) => AdHocStrategy::Ocr,
            (false, false) if !fields.coordinates.is_empty() => AdHocStrategy::Coordinate,
            (false, false) => AdHocStrategy::Ocr,
        }
    }
}

/// Extracts ad-hoc fields from one file.
pub struct AdHocExtractor<'a> {
    fields: &'a AdHocFields,
    backends: &'a Backends,
    strategy: AdHocStrategy,
    /// OCR only the first N pages; 0 reads every page.
    max_read_page: u32,
}

impl<'a> AdHocExtractor<'a> {
    pub fn new(
        fields: &'a AdHocFields,
        backends: &'a Backends,
        strategy: AdHocStrategy,
        max_read_page: u32,
    ) -> Self {
        Self {
            fields,
            backends,
            strategy,
            max_read_page,
        }
    }

    pub fn extract(&self, file: &Path, work_dir: &Path) -> Result<Record, FileFailure> {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut record = Record::new(filename);

        let outcome = match self.strategy {
            AdHocStrategy::Coordinate => match self.extract_coordinates(&mut record, file, work_dir) {
                Ok(()) => Ok(()),
                Err(first) => {
                    debug!("Coordinate extraction of {:?} failed ({}), retrying with OCR", file, first);
                    self.extract_ocr(&mut record, file, work_dir)
                        .map_err(|second| FileError::NoStrategySucceeded(format!("{first}; OCR: {second}")))
                }
            },
            AdHocStrategy::Ocr => self
                .extract_ocr(&mut record, file, work_dir)
                .map_err(|e| FileError::NoStrategySucceeded(e.to_string())),
        };

        match outcome {
            Ok(()) => Ok(record),
            Err(error) => Err(FileFailure {
                partial: Some(record),
                error,
            }),
        }
    }

    /// Region text for every coordinate field. Fails on the first backend
    /// error, or when every value is blank.
    fn extract_coordinates(&self, record: &mut Record, file: &Path, work_dir: &Path) -> Result<(), FileError> {
        if InputKind::from_path(file) != Some(InputKind::Pdf) {
            return Err(FileError::Unsupported(format!(
                "coordinate extraction needs a PDF: {}",
                file.display()
            )));
        }

        let mut any_text = false;
        for (name, geometry) in &self.fields.coordinates {
            let text = self
                .backends
                .region_text
                .extract_region(file, geometry, work_dir)
                .map_err(|e| FileError::NoStrategySucceeded(e.to_string()))?;
            if !is_blank(&text) {
                any_text = true;
            }
            record.insert(name, text);
        }

        if any_text {
            Ok(())
        } else {
            Err(FileError::CoordinatesBlank)
        }
    }

    fn extract_ocr(&self, record: &mut Record, file: &Path, work_dir: &Path) -> Result<(), BackendError> {
        let images = match InputKind::from_path(file) {
            Some(InputKind::Pdf) => {
                let last_page = (self.max_read_page > 0).then_some(self.max_read_page);
                let raster_dir = work_dir.join("ocr");
                std::fs::create_dir_all(&raster_dir).map_err(|e| BackendError::Output {
                    program: "docfields".to_string(),
                    reason: e.to_string(),
                })?;
                self.backends.rasterizer.rasterize(file, &raster_dir, last_page)?
            }
            Some(InputKind::Image) => vec![file.to_path_buf()],
            None => {
                return Err(BackendError::Unsupported {
                    backend: "ocr".to_string(),
                    path: file.to_path_buf(),
                });
            }
        };

        for image in &images {
            let text = self.backends.ocr.recognize(image, work_dir)?;
            for (name, pattern) in &self.fields.patterns {
                if let Some(value) = first_capture(pattern, &text) {
                    record.insert(name, value);
                }
            }
        }
        Ok(())
    }
}
