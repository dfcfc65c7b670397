//! Tesseract command-line OCR.

use std::ffi::OsStr;
use std::path::Path;

use super::OcrEngine;
use super::command::ToolCommand;
use crate::error::BackendError;

/// OCR via `tesseract <image> <outbase> -l <language>`, read back from `<outbase>.txt`.
#[derive(Debug, Clone)]
pub struct Tesseract {
    command: ToolCommand,
    language: String,
}

impl Tesseract {
    pub fn new(command: ToolCommand, language: impl Into<String>) -> Self {
        Self {
            command,
            language: language.into(),
        }
    }
}

impl OcrEngine for Tesseract {
    fn recognize(&self, image: &Path, work_dir: &Path) -> Result<String, BackendError> {
        let base = work_dir.join(format!("ocr_{}", uuid::Uuid::new_v4()));
        self.command.run(
            [
                image.as_os_str(),
                base.as_os_str(),
                OsStr::new("-l"),
                OsStr::new(&self.language),
            ],
            work_dir,
        )?;

        let out = base.with_extension("txt");
        let text = std::fs::read(&out)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .map_err(|e| self.command.output_error(e.to_string()));
        let _ = std::fs::remove_file(&out);
        text
    }
}
