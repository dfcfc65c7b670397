//! In-memory collaborators for unit tests. Every fake counts its calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, GrayImage};

use super::*;

fn fail(backend: &str) -> BackendError {
    BackendError::Engine {
        backend: backend.to_string(),
        reason: "scripted failure".to_string(),
    }
}

/// Write a blank PNG of the given width, used to tag images for [`FakeDecoder`].
pub fn write_png(path: &Path, width: u32) {
    DynamicImage::ImageLuma8(GrayImage::new(width, 10))
        .save(path)
        .unwrap();
}

#[derive(Default)]
pub struct FakeText {
    pub text: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeText {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextExtractor for FakeText {
    fn name(&self) -> &str {
        "fake"
    }

    fn extract_text(&self, _pdf: &Path, _work_dir: &Path) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone().ok_or_else(|| fail("fake-text"))
    }
}

impl OcrEngine for FakeText {
    fn recognize(&self, _image: &Path, _work_dir: &Path) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone().ok_or_else(|| fail("fake-ocr"))
    }
}

/// Region text keyed by geometry; unknown geometries fail.
#[derive(Default)]
pub struct FakeRegion {
    pub by_geometry: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl FakeRegion {
    pub fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            by_geometry: entries
                .iter()
                .map(|(g, t)| (g.to_string(), t.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

impl RegionTextExtractor for FakeRegion {
    fn extract_region(
        &self,
        _pdf: &Path,
        geometry: &str,
        _work_dir: &Path,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_geometry
            .get(geometry)
            .cloned()
            .ok_or_else(|| fail("fake-region"))
    }
}

/// Splits every document into `pages` empty page files.
pub struct FakeSplitter {
    pub pages: u32,
    pub calls: AtomicUsize,
}

impl FakeSplitter {
    pub fn new(pages: u32) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
        })
    }
}

impl PageSplitter for FakeSplitter {
    fn split(&self, _file: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((1..=self.pages)
            .map(|n| {
                let page = out_dir.join(format!("page_{n}.pdf"));
                std::fs::write(&page, b"%PDF-1.4").unwrap();
                page
            })
            .collect())
    }
}

/// Writes PNGs of the configured widths.
#[derive(Default)]
pub struct FakeImages {
    pub widths: Vec<u32>,
    pub calls: AtomicUsize,
}

impl FakeImages {
    pub fn with_widths(widths: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            widths: widths.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn write_all(&self, out_dir: &Path, prefix: &str) -> Vec<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let path = out_dir.join(format!("{prefix}_{i}.png"));
                write_png(&path, *w);
                path
            })
            .collect()
    }
}

impl ImageExtractor for FakeImages {
    fn extract_images(&self, _pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BackendError> {
        Ok(self.write_all(out_dir, "image"))
    }
}

impl PageRasterizer for FakeImages {
    fn rasterize(
        &self,
        _pdf: &Path,
        out_dir: &Path,
        last_page: Option<u32>,
    ) -> Result<Vec<PathBuf>, BackendError> {
        let mut pages = self.write_all(out_dir, "raster");
        if let Some(last) = last_page {
            pages.truncate(last as usize);
        }
        Ok(pages)
    }
}

/// Decodes images whose width is registered; everything else has no code.
#[derive(Default)]
pub struct FakeDecoder {
    pub by_width: HashMap<u32, String>,
    pub calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn with(entries: &[(u32, &str)]) -> Arc<Self> {
        Arc::new(Self {
            by_width: entries.iter().map(|(w, v)| (*w, v.to_string())).collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

impl CodeDecoder for FakeDecoder {
    fn decode(&self, image: &DynamicImage, _kind: CodeKind) -> Result<Option<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_width.get(&image.width()).cloned())
    }
}

/// Handles to every fake behind a [`Backends`] bundle.
pub struct FakeBackends {
    pub splitter: Arc<FakeSplitter>,
    pub external_text: Arc<FakeText>,
    pub native_text: Arc<FakeText>,
    pub region_text: Arc<FakeRegion>,
    pub rasterizer: Arc<FakeImages>,
    pub images: Arc<FakeImages>,
    pub ocr: Arc<FakeText>,
    pub decoder: Arc<FakeDecoder>,
}

impl Default for FakeBackends {
    fn default() -> Self {
        Self {
            splitter: FakeSplitter::new(1),
            external_text: FakeText::failing(),
            native_text: FakeText::failing(),
            region_text: FakeRegion::with(&[]),
            rasterizer: FakeImages::with_widths(&[40]),
            images: FakeImages::with_widths(&[]),
            ocr: FakeText::failing(),
            decoder: FakeDecoder::with(&[]),
        }
    }
}

impl FakeBackends {
    pub fn backends(&self) -> Backends {
        Backends {
            splitter: self.splitter.clone(),
            external_text: self.external_text.clone(),
            native_text: self.native_text.clone(),
            region_text: self.region_text.clone(),
            rasterizer: self.rasterizer.clone(),
            images: self.images.clone(),
            ocr: self.ocr.clone(),
            decoder: self.decoder.clone(),
        }
    }
}
