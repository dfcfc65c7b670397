//! Tool and runtime settings for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main settings for docfields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// External tool executables.
    pub tools: ToolPaths,

    /// OCR configuration.
    pub ocr: OcrSettings,

    /// Runtime configuration.
    pub runtime: RuntimeSettings,
}

/// Executable names or paths of the external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Region text extraction (PDFlib TET).
    pub tet: PathBuf,

    /// Plain text extraction (xpdf).
    pub pdftotext: PathBuf,

    /// Page rasterization (xpdf).
    pub pdftopng: PathBuf,

    /// OCR engine.
    pub tesseract: PathBuf,

    /// PDF repair (MuPDF).
    pub mutool: PathBuf,

    /// Headless browser for printing links.
    pub chromium: PathBuf,

    /// Alternative link printer.
    pub wkhtmltopdf: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            tet: PathBuf::from("tet"),
            pdftotext: PathBuf::from("pdftotext"),
            pdftopng: PathBuf::from("pdftopng"),
            tesseract: PathBuf::from("tesseract"),
            mutool: PathBuf::from("mutool"),
            chromium: PathBuf::from("chromium"),
            wkhtmltopdf: PathBuf::from("wkhtmltopdf"),
        }
    }
}

/// OCR configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language pack(s), e.g. `chi_sim` or `eng+chi_sim`.
    pub language: String,

    /// Directory with `det.onnx`, `rec.onnx` and `dict.txt`. When set and the
    /// `onnx-ocr` feature is enabled, OCR runs in-process instead of via tesseract.
    pub model_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "chi_sim".to_string(),
            model_dir: None,
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Per-invocation timeout for external tools, in seconds.
    pub command_timeout_secs: u64,

    /// Directory under which the run's temp root is created.
    /// Defaults to the current directory.
    pub temp_parent: Option<PathBuf>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            command_timeout_secs: 180,
            temp_parent: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save settings to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime.command_timeout_secs.max(1))
    }

    /// Parent directory for the run's temp root.
    pub fn temp_parent(&self) -> PathBuf {
        self.runtime
            .temp_parent
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"ocr": {"language": "eng"}}"#).unwrap();
        assert_eq!(settings.ocr.language, "eng");
        assert_eq!(settings.runtime.command_timeout_secs, 180);
        assert_eq!(settings.tools.tet, PathBuf::from("tet"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.runtime.command_timeout_secs = 30;
        settings.save(&path).unwrap();

        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded.command_timeout(), Duration::from_secs(30));
        assert_eq!(loaded.temp_parent(), PathBuf::from("."));
    }
}
