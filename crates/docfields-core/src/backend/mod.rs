//! External capabilities behind narrow traits.
//!
//! Every tool the extraction engine depends on (page splitting, text
//! extraction, rasterization, OCR, code decoding) is reached through one of
//! the traits below, so tests can substitute in-memory fakes. Link printing
//! and PDF repair sit behind their own traits.

mod codes;
mod command;
#[cfg(test)]
pub(crate) mod fakes;
#[cfg(feature = "onnx-ocr")]
mod onnx;
mod pdf;
mod render;
mod repair;
mod tesseract;
mod tet;
mod xpdf;

pub use codes::{RxingDecoder, crop_image};
pub use command::ToolCommand;
#[cfg(feature = "onnx-ocr")]
pub use onnx::OnnxOcr;
pub use pdf::{LopdfImages, LopdfSplitter, NativePdfText};
pub use render::{ChromiumPrint, HttpDownload, RenderTool, Wkhtmltopdf};
pub use repair::MutoolClean;
pub use tesseract::Tesseract;
pub use tet::Tet;
pub use xpdf::{PdfToPng, PdfToText};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use tracing::info;

use crate::error::BackendError;
use crate::models::{CodeKind, Settings};

/// Splits a document into one file per page.
pub trait PageSplitter: Send + Sync {
    /// Write single-page documents into `out_dir`, returning them in page order.
    fn split(&self, file: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BackendError>;
}

/// Extracts the whole text layer of a single-page PDF.
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract_text(&self, pdf: &Path, work_dir: &Path) -> Result<String, BackendError>;
}

/// Extracts the text inside a geometry on a PDF page.
pub trait RegionTextExtractor: Send + Sync {
    fn extract_region(
        &self,
        pdf: &Path,
        geometry: &str,
        work_dir: &Path,
    ) -> Result<String, BackendError>;
}

/// Renders PDF pages to PNG files.
pub trait PageRasterizer: Send + Sync {
    /// Render pages `1..=last_page` (all pages when `None`) into `out_dir`,
    /// returning the images in page order.
    fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        last_page: Option<u32>,
    ) -> Result<Vec<PathBuf>, BackendError>;
}

/// Extracts embedded images from a PDF page.
pub trait ImageExtractor: Send + Sync {
    fn extract_images(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BackendError>;
}

/// Recognizes text in an image file.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path, work_dir: &Path) -> Result<String, BackendError>;
}

/// Decodes a machine-readable code from an image.
pub trait CodeDecoder: Send + Sync {
    /// `Ok(None)` when no code of `kind` is found.
    fn decode(&self, image: &DynamicImage, kind: CodeKind) -> Result<Option<String>, BackendError>;
}

/// Rewrites a damaged PDF into a clean copy.
pub trait PdfRepairer: Send + Sync {
    fn repair(&self, input: &Path, output: &Path) -> Result<(), BackendError>;
}

/// Prints the page behind a URL into a PDF file.
pub trait PdfRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, url: &str, output: &Path) -> Result<(), BackendError>;
}

/// The configured HTML-to-PDF printer.
pub fn page_renderer(tool: RenderTool, settings: &Settings) -> Arc<dyn PdfRenderer> {
    let timeout = settings.command_timeout();
    match tool {
        RenderTool::Chromium => {
            Arc::new(ChromiumPrint::new(ToolCommand::new(&settings.tools.chromium, timeout)))
        }
        RenderTool::Wkhtmltopdf => {
            Arc::new(Wkhtmltopdf::new(ToolCommand::new(&settings.tools.wkhtmltopdf, timeout)))
        }
    }
}

/// The full set of capabilities used by the extraction engine.
#[derive(Clone)]
pub struct Backends {
    pub splitter: Arc<dyn PageSplitter>,
    pub external_text: Arc<dyn TextExtractor>,
    pub native_text: Arc<dyn TextExtractor>,
    pub region_text: Arc<dyn RegionTextExtractor>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub images: Arc<dyn ImageExtractor>,
    pub ocr: Arc<dyn OcrEngine>,
    pub decoder: Arc<dyn CodeDecoder>,
}

impl Backends {
    /// Production backends configured from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, BackendError> {
        let timeout = settings.command_timeout();
        let tools = &settings.tools;

        Ok(Self {
            splitter: Arc::new(LopdfSplitter),
            external_text: Arc::new(PdfToText::new(ToolCommand::new(&tools.pdftotext, timeout))),
            native_text: Arc::new(NativePdfText),
            region_text: Arc::new(Tet::new(ToolCommand::new(&tools.tet, timeout))),
            rasterizer: Arc::new(PdfToPng::new(ToolCommand::new(&tools.pdftopng, timeout))),
            images: Arc::new(LopdfImages),
            ocr: ocr_engine(settings)?,
            decoder: Arc::new(RxingDecoder),
        })
    }
}

#[cfg(feature = "onnx-ocr")]
fn ocr_engine(settings: &Settings) -> Result<Arc<dyn OcrEngine>, BackendError> {
    if let Some(model_dir) = &settings.ocr.model_dir {
        info!("Using in-process OCR models from {:?}", model_dir);
        return Ok(Arc::new(OnnxOcr::from_dir(model_dir)?));
    }
    Ok(tesseract_engine(settings))
}

#[cfg(not(feature = "onnx-ocr"))]
fn ocr_engine(settings: &Settings) -> Result<Arc<dyn OcrEngine>, BackendError> {
    if settings.ocr.model_dir.is_some() {
        info!("ocr.model_dir is set but the onnx-ocr feature is disabled; using tesseract");
    }
    Ok(tesseract_engine(settings))
}

fn tesseract_engine(settings: &Settings) -> Arc<dyn OcrEngine> {
    Arc::new(Tesseract::new(
        ToolCommand::new(&settings.tools.tesseract, settings.command_timeout()),
        settings.ocr.language.clone(),
    ))
}
