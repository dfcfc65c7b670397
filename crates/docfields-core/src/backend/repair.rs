//! PDF repair through MuPDF's `mutool clean`.

use std::ffi::OsStr;
use std::path::Path;

use tracing::info;

use super::PdfRepairer;
use super::command::ToolCommand;
use crate::error::BackendError;

#[derive(Debug, Clone)]
pub struct MutoolClean {
    command: ToolCommand,
}

impl MutoolClean {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl PdfRepairer for MutoolClean {
    fn repair(&self, input: &Path, output: &Path) -> Result<(), BackendError> {
        if !input.is_file() {
            return Err(self.command.output_error(format!("{} does not exist", input.display())));
        }
        let work_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        self.command.run(
            [OsStr::new("clean"), input.as_os_str(), output.as_os_str()],
            work_dir,
        )?;

        if !output.is_file() {
            return Err(self.command.output_error("no output written"));
        }
        info!("Repaired {:?} -> {:?}", input, output);
        Ok(())
    }
}
