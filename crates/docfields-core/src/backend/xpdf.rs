//! xpdf command-line tools: `pdftotext` and `pdftopng`.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::command::ToolCommand;
use super::{PageRasterizer, TextExtractor};
use crate::error::BackendError;

lazy_static! {
    /// `pdftopng` names pages `<root>-000001.png`.
    static ref PAGE_SUFFIX: Regex = Regex::new(r"-(\d+)\.png$").unwrap();
}

/// Text extraction via `pdftotext -enc UTF-8 -simple`.
#[derive(Debug, Clone)]
pub struct PdfToText {
    command: ToolCommand,
}

impl PdfToText {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl TextExtractor for PdfToText {
    fn name(&self) -> &str {
        "pdftotext"
    }

    fn extract_text(&self, pdf: &Path, work_dir: &Path) -> Result<String, BackendError> {
        let out = work_dir.join(format!("{}.txt", uuid::Uuid::new_v4()));
        self.command.run(
            [
                OsStr::new("-enc"),
                OsStr::new("UTF-8"),
                OsStr::new("-simple"),
                pdf.as_os_str(),
                out.as_os_str(),
            ],
            work_dir,
        )?;

        let text = std::fs::read(&out)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .map_err(|e| self.command.output_error(e.to_string()));
        let _ = std::fs::remove_file(&out);
        text
    }
}

/// Page rasterization via `pdftopng`.
#[derive(Debug, Clone)]
pub struct PdfToPng {
    command: ToolCommand,
}

impl PdfToPng {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl PageRasterizer for PdfToPng {
    fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        last_page: Option<u32>,
    ) -> Result<Vec<PathBuf>, BackendError> {
        let root = format!("{:x}", md5::compute(pdf.as_os_str().as_encoded_bytes()));
        let mut args: Vec<OsString> = Vec::new();
        if let Some(last) = last_page {
            args.push("-l".into());
            args.push(last.to_string().into());
        }
        args.push(pdf.as_os_str().to_os_string());
        args.push(out_dir.join(&root).into_os_string());
        self.command.run(args, out_dir)?;

        let entries = std::fs::read_dir(out_dir).map_err(|e| self.command.output_error(e.to_string()))?;
        let prefix = format!("{root}-");
        let mut pages: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with(&prefix) {
                    return None;
                }
                let number = PAGE_SUFFIX.captures(&name)?.get(1)?.as_str().parse().ok()?;
                Some((number, entry.path()))
            })
            .collect();

        if pages.is_empty() {
            return Err(self.command.output_error("no pages rendered"));
        }
        pages.sort_by_key(|(number, _)| *number);
        debug!("Rendered {} pages of {:?}", pages.len(), pdf);

        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_suffix() {
        let caps = PAGE_SUFFIX.captures("abc-000012.png").unwrap();
        assert_eq!(&caps[1], "000012");
        assert!(PAGE_SUFFIX.captures("abc.png").is_none());
    }
}
