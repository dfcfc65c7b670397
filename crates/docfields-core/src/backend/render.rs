//! Printing web pages to PDF: headless Chromium, wkhtmltopdf, or a plain
//! download when the link already points at a PDF.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use super::PdfRenderer;
use super::command::ToolCommand;
use crate::error::BackendError;

/// Tool used to print HTML pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderTool {
    #[default]
    Chromium,
    Wkhtmltopdf,
}

impl FromStr for RenderTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chromium" | "chrome" | "chromedp" => Ok(RenderTool::Chromium),
            "wkhtmltopdf" => Ok(RenderTool::Wkhtmltopdf),
            other => Err(format!("unknown print tool: {other} (expected chromium or wkhtmltopdf)")),
        }
    }
}

impl fmt::Display for RenderTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderTool::Chromium => write!(f, "chromium"),
            RenderTool::Wkhtmltopdf => write!(f, "wkhtmltopdf"),
        }
    }
}

fn work_dir(output: &Path) -> &Path {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn ensure_written(command: &ToolCommand, output: &Path) -> Result<(), BackendError> {
    if output.is_file() {
        Ok(())
    } else {
        Err(command.output_error(format!("{} was not written", output.display())))
    }
}

/// `chromium --headless --print-to-pdf=<out> <url>`.
#[derive(Debug, Clone)]
pub struct ChromiumPrint {
    command: ToolCommand,
}

impl ChromiumPrint {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl PdfRenderer for ChromiumPrint {
    fn name(&self) -> &str {
        "chromium"
    }

    fn render(&self, url: &str, output: &Path) -> Result<(), BackendError> {
        let mut print_to = OsString::from("--print-to-pdf=");
        print_to.push(output);

        self.command.run(
            [
                OsStr::new("--headless"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--no-pdf-header-footer"),
                print_to.as_os_str(),
                OsStr::new(url),
            ],
            work_dir(output),
        )?;
        ensure_written(&self.command, output)
    }
}

/// A4 portrait, zero margins.
#[derive(Debug, Clone)]
pub struct Wkhtmltopdf {
    command: ToolCommand,
}

impl Wkhtmltopdf {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl PdfRenderer for Wkhtmltopdf {
    fn name(&self) -> &str {
        "wkhtmltopdf"
    }

    fn render(&self, url: &str, output: &Path) -> Result<(), BackendError> {
        let mut args: Vec<&OsStr> = [
            "--orientation", "Portrait", "--page-size", "A4", "--encoding", "utf-8",
            "-R", "0", "-L", "0", "-T", "0", "-B", "0", "--quiet",
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();
        args.push(OsStr::new(url));
        args.push(output.as_os_str());

        self.command.run(args, work_dir(output))?;
        ensure_written(&self.command, output)
    }
}

/// Fetches links that already serve a PDF.
#[derive(Debug, Clone)]
pub struct HttpDownload {
    timeout: Duration,
}

impl HttpDownload {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn error(&self, reason: impl ToString) -> BackendError {
        BackendError::Engine {
            backend: "http".to_string(),
            reason: reason.to_string(),
        }
    }
}

impl PdfRenderer for HttpDownload {
    fn name(&self) -> &str {
        "http"
    }

    fn render(&self, url: &str, output: &Path) -> Result<(), BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.error(e))?;

        let bytes = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(|e| self.error(e))?;

        std::fs::write(output, &bytes)
            .map_err(|e| self.error(format!("failed to write {}: {e}", output.display())))?;
        debug!("Downloaded {} ({} bytes) to {:?}", url, bytes.len(), output);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in tool that writes its last argument as a file.
    fn fake_tool(dir: &Path, script: &str) -> ToolCommand {
        let path = dir.join("fake_print");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ToolCommand::new(&path, Duration::from_secs(5))
    }

    #[test]
    fn test_render_tool_names() {
        assert_eq!("chromedp".parse::<RenderTool>(), Ok(RenderTool::Chromium));
        assert_eq!("WKHTMLTOPDF".parse::<RenderTool>(), Ok(RenderTool::Wkhtmltopdf));
        assert!("prince".parse::<RenderTool>().is_err());
        assert_eq!(RenderTool::default().to_string(), "chromium");
    }

    #[test]
    fn test_wkhtmltopdf_writes_last_argument() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), r#"for last; do :; done; echo "$@" > "$last""#);
        let out = dir.path().join("page.pdf");

        Wkhtmltopdf::new(tool)
            .render("https://example.com/a?x=1&y=2", &out)
            .unwrap();

        let argv = std::fs::read_to_string(&out).unwrap();
        assert!(argv.starts_with("--orientation Portrait --page-size A4"));
        assert!(argv.contains("https://example.com/a?x=1&y=2"));
    }

    #[test]
    fn test_chromium_missing_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "exit 0");
        let out = dir.path().join("page.pdf");

        let err = ChromiumPrint::new(tool).render("https://example.com", &out).unwrap_err();
        assert!(matches!(err, BackendError::Output { .. }));
    }

    #[test]
    fn test_download_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = HttpDownload::new(Duration::from_secs(1))
            .render("not a url", &dir.path().join("x.pdf"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Engine { .. }));
    }
}
