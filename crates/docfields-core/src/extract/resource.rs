//! Per-file page resources with memoized extraction artifacts.
//!
//! A [`PageResources`] is created for one input file and owned by the worker
//! processing it. Text per source, extracted images and the rasterized page
//! are each computed at most once per page; later requests, including ones
//! that previously failed, are answered from the cache.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::backend::Backends;
use crate::error::{BackendError, FileError};
use crate::input::InputKind;
use crate::models::TextSource;

/// Artifacts of one page of one input file.
#[derive(Debug)]
pub struct PageResource {
    number: u32,
    path: PathBuf,
    kind: InputKind,
    work_dir: PathBuf,
    texts: HashMap<TextSource, Result<String, BackendError>>,
    images: Option<Result<Vec<PathBuf>, BackendError>>,
    raster: Option<Result<Vec<PathBuf>, BackendError>>,
}

impl PageResource {
    fn new(number: u32, path: PathBuf, kind: InputKind, work_dir: PathBuf) -> Result<Self, FileError> {
        fs::create_dir_all(work_dir.join("images"))?;
        fs::create_dir_all(work_dir.join("raster"))?;
        Ok(Self {
            number,
            path,
            kind,
            work_dir,
            texts: HashMap::new(),
            images: None,
            raster: None,
        })
    }

    /// 1-based page number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The page document (split page, or the whole input file for page 1).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory for this page's artifacts.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Text of the page from `source`.
    pub fn text(&mut self, source: TextSource, backends: &Backends) -> Result<String, BackendError> {
        if let Some(cached) = self.texts.get(&source) {
            return cached.clone();
        }
        let computed = self.compute_text(source, backends);
        if let Err(e) = &computed {
            debug!("Page {} text source {} failed: {}", self.number, source, e);
        }
        self.texts.insert(source, computed.clone());
        computed
    }

    fn compute_text(&mut self, source: TextSource, backends: &Backends) -> Result<String, BackendError> {
        match source {
            TextSource::ExternalTool => {
                self.require_pdf(backends.external_text.name())?;
                backends.external_text.extract_text(&self.path, &self.work_dir)
            }
            TextSource::NativeParser => {
                self.require_pdf(backends.native_text.name())?;
                backends.native_text.extract_text(&self.path, &self.work_dir)
            }
            TextSource::Ocr => {
                let raster = self.raster(backends)?;
                let first = raster.first().ok_or_else(|| BackendError::Engine {
                    backend: "rasterizer".to_string(),
                    reason: format!("page {} rendered no image", self.number),
                })?;
                backends.ocr.recognize(first, &self.work_dir)
            }
        }
    }

    /// Images embedded in the page. An image input is its own single image.
    pub fn images(&mut self, backends: &Backends) -> Result<Vec<PathBuf>, BackendError> {
        if let Some(cached) = &self.images {
            return cached.clone();
        }
        let computed = match self.kind {
            InputKind::Image => Ok(vec![self.path.clone()]),
            InputKind::Pdf => backends
                .images
                .extract_images(&self.path, &self.work_dir.join("images")),
        };
        self.images = Some(computed.clone());
        computed
    }

    /// The page rendered to PNG. An image input is its own rendering.
    pub fn raster(&mut self, backends: &Backends) -> Result<Vec<PathBuf>, BackendError> {
        if let Some(cached) = &self.raster {
            return cached.clone();
        }
        let computed = match self.kind {
            InputKind::Image => Ok(vec![self.path.clone()]),
            InputKind::Pdf => {
                backends
                    .rasterizer
                    .rasterize(&self.path, &self.work_dir.join("raster"), Some(1))
            }
        };
        self.raster = Some(computed.clone());
        computed
    }

    fn require_pdf(&self, backend: &str) -> Result<(), BackendError> {
        match self.kind {
            InputKind::Pdf => Ok(()),
            InputKind::Image => Err(BackendError::Unsupported {
                backend: backend.to_string(),
                path: self.path.clone(),
            }),
        }
    }
}

/// Every page resource of one input file.
#[derive(Debug)]
pub struct PageResources {
    file: PathBuf,
    pages: BTreeMap<u32, PageResource>,
}

impl PageResources {
    /// Prepare page resources for `file` inside `work_dir`.
    ///
    /// With `split` set, a PDF is split into one document per page before
    /// anything else runs; otherwise the whole file serves as page 1.
    pub fn prepare(
        file: &Path,
        split: bool,
        work_dir: &Path,
        backends: &Backends,
    ) -> Result<Self, FileError> {
        let kind = InputKind::from_path(file)
            .ok_or_else(|| FileError::Unsupported(file.display().to_string()))?;
        let mut pages = BTreeMap::new();

        if split && kind == InputKind::Pdf {
            let split_dir = work_dir.join("pages");
            fs::create_dir_all(&split_dir)?;
            let page_paths = backends
                .splitter
                .split(file, &split_dir)
                .map_err(|e| FileError::Split {
                    file: file.display().to_string(),
                    reason: e.to_string(),
                })?;

            for (number, path) in (1u32..).zip(page_paths) {
                let page_dir = work_dir.join(format!("page_{number}"));
                pages.insert(number, PageResource::new(number, path, kind, page_dir)?);
            }
            debug!("Prepared {} split pages for {:?}", pages.len(), file);
        } else {
            let page_dir = work_dir.join("page_1");
            pages.insert(1, PageResource::new(1, file.to_path_buf(), kind, page_dir)?);
        }

        Ok(Self {
            file: file.to_path_buf(),
            pages,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The resource for a page, or a hard error when the page does not exist.
    pub fn page_mut(&mut self, page: u32) -> Result<&mut PageResource, FileError> {
        let file = &self.file;
        self.pages.get_mut(&page).ok_or_else(|| FileError::MissingPage {
            page,
            file: file.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fakes::{FakeBackends, FakeImages, FakeSplitter, FakeText};
    use pretty_assertions::assert_eq;

    fn pdf_in(dir: &Path) -> PathBuf {
        let file = dir.join("doc.pdf");
        fs::write(&file, b"%PDF-1.4").unwrap();
        file
    }

    #[test]
    fn test_text_computed_once_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeBackends {
            external_text: FakeText::returning("hello"),
            native_text: FakeText::failing(),
            ..Default::default()
        };
        let backends = fakes.backends();
        let mut resources =
            PageResources::prepare(&pdf_in(dir.path()), false, dir.path(), &backends).unwrap();
        let page = resources.page_mut(1).unwrap();

        for _ in 0..3 {
            assert_eq!(page.text(TextSource::ExternalTool, &backends).unwrap(), "hello");
            assert!(page.text(TextSource::NativeParser, &backends).is_err());
        }
        assert_eq!(fakes.external_text.calls(), 1);
        assert_eq!(fakes.native_text.calls(), 1);
    }

    #[test]
    fn test_ocr_reuses_raster() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeBackends {
            ocr: FakeText::returning("scanned"),
            rasterizer: FakeImages::with_widths(&[30]),
            ..Default::default()
        };
        let backends = fakes.backends();
        let mut resources =
            PageResources::prepare(&pdf_in(dir.path()), false, dir.path(), &backends).unwrap();
        let page = resources.page_mut(1).unwrap();

        assert_eq!(page.text(TextSource::Ocr, &backends).unwrap(), "scanned");
        assert_eq!(page.raster(&backends).unwrap().len(), 1);
        assert_eq!(page.text(TextSource::Ocr, &backends).unwrap(), "scanned");
        assert_eq!(fakes.rasterizer.calls(), 1);
        assert_eq!(fakes.ocr.calls(), 1);
    }

    #[test]
    fn test_split_and_missing_page() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeBackends {
            splitter: FakeSplitter::new(2),
            ..Default::default()
        };
        let backends = fakes.backends();
        let mut resources =
            PageResources::prepare(&pdf_in(dir.path()), true, dir.path(), &backends).unwrap();

        assert_eq!(resources.page_count(), 2);
        assert_eq!(resources.page_mut(2).unwrap().number(), 2);
        assert!(matches!(
            resources.page_mut(3),
            Err(FileError::MissingPage { page: 3, .. })
        ));
    }

    #[test]
    fn test_image_input_is_its_own_page() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("scan.png");
        crate::backend::fakes::write_png(&png, 12);

        let fakes = FakeBackends {
            splitter: FakeSplitter::new(3),
            external_text: FakeText::returning("never"),
            ..Default::default()
        };
        let backends = fakes.backends();
        let mut resources = PageResources::prepare(&png, true, dir.path(), &backends).unwrap();
        assert_eq!(resources.page_count(), 1);

        let page = resources.page_mut(1).unwrap();
        assert_eq!(page.images(&backends).unwrap(), vec![png.clone()]);
        assert_eq!(page.raster(&backends).unwrap(), vec![png.clone()]);
        assert!(matches!(
            page.text(TextSource::ExternalTool, &backends),
            Err(BackendError::Unsupported { .. })
        ));
        assert_eq!(fakes.external_text.calls(), 0);
        assert_eq!(fakes.rasterizer.calls(), 0);
    }
}
