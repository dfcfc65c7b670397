//! PDFlib TET region text extraction.

use std::ffi::OsStr;
use std::path::Path;

use super::RegionTextExtractor;
use super::command::ToolCommand;
use crate::error::BackendError;

/// Region text via `tet -o <out> --pageopt "includebox={{<geometry>}}" <pdf>`.
#[derive(Debug, Clone)]
pub struct Tet {
    command: ToolCommand,
}

impl Tet {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

/// The `--pageopt` value restricting extraction to `geometry`.
fn include_box(geometry: &str) -> String {
    format!("includebox={{{{{geometry}}}}}")
}

impl RegionTextExtractor for Tet {
    fn extract_region(
        &self,
        pdf: &Path,
        geometry: &str,
        work_dir: &Path,
    ) -> Result<String, BackendError> {
        let out = work_dir.join(format!("{}.txt", uuid::Uuid::new_v4()));
        let pageopt = include_box(geometry);
        self.command.run(
            [
                OsStr::new("-o"),
                out.as_os_str(),
                OsStr::new("--pageopt"),
                OsStr::new(&pageopt),
                pdf.as_os_str(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_box() {
        assert_eq!(include_box("10 20 30 40"), "includebox={{10 20 30 40}}");
    }
}
