//! Per-file, per-field extraction.

use std::path::Path;

use image::DynamicImage;
use regex::Regex;
use tracing::{debug, warn};

use super::purify::{is_blank, purify};
use super::resource::{PageResource, PageResources};
use crate::backend::{Backends, crop_image};
use crate::error::FileError;
use crate::models::{CodeKind, CropBox, FieldConfig, FieldMethod, FieldSet, Record, TextSource};

/// Terminal state of one field on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Resolved(String),
    Unresolved,
}

impl FieldOutcome {
    fn from_text(text: String) -> Self {
        if is_blank(&text) {
            FieldOutcome::Unresolved
        } else {
            FieldOutcome::Resolved(text)
        }
    }
}

/// First capture group of `pattern` in `text`, purified, if non-blank.
pub(crate) fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    let captures = pattern.captures(text)?;
    let value = purify(captures.get(1)?.as_str());
    (!is_blank(&value)).then_some(value)
}

/// Applies a [`FieldSet`] to one input file.
///
/// Owns the file's [`PageResources`]; dropped as soon as the file is done.
pub struct SingleFileExtractor<'a> {
    file: &'a Path,
    fields: &'a FieldSet,
    backends: &'a Backends,
    resources: PageResources,
    strict_coordinates: bool,
}

impl<'a> SingleFileExtractor<'a> {
    /// Prepare page resources, splitting the document when a field reads past page 1.
    pub fn new(
        file: &'a Path,
        fields: &'a FieldSet,
        backends: &'a Backends,
        work_dir: &Path,
    ) -> Result<Self, FileError> {
        let resources = PageResources::prepare(file, fields.needs_split(), work_dir, backends)?;
        Ok(Self {
            file,
            fields,
            backends,
            resources,
            strict_coordinates: false,
        })
    }

    /// Fail the file when every coordinate field comes back blank.
    pub fn strict_coordinates(mut self, strict: bool) -> Self {
        self.strict_coordinates = strict;
        self
    }

    /// Extract every field. Any hard error fails the whole file.
    pub fn run(mut self) -> Result<Record, FileError> {
        let filename = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut record = Record::new(filename);

        let mut coordinate_fields = 0usize;
        let mut coordinate_hits = 0usize;

        for field in self.fields.fields() {
            let is_coordinate = matches!(field.method, FieldMethod::Coordinate { .. });
            if is_coordinate {
                coordinate_fields += 1;
            }

            match self.extract_field(field)? {
                FieldOutcome::Resolved(value) => {
                    if is_coordinate {
                        coordinate_hits += 1;
                    }
                    record.insert(&field.name, value);
                }
                FieldOutcome::Unresolved => {
                    debug!("{}: field {} unresolved", record.filename, field.name);
                }
            }
        }

        if self.strict_coordinates && coordinate_fields > 0 && coordinate_hits == 0 {
            return Err(FileError::CoordinatesBlank);
        }
        Ok(record)
    }

    /// Extract one field.
    pub fn extract_field(&mut self, field: &FieldConfig) -> Result<FieldOutcome, FileError> {
        let backends = self.backends;
        let page = self.resources.page_mut(field.page)?;

        match &field.method {
            FieldMethod::Coordinate { geometry } => Ok(extract_coordinate(page, geometry, backends)),
            FieldMethod::RegexText { pattern, sources } => {
                Ok(extract_regex(page, pattern, sources, backends))
            }
            FieldMethod::Scan { code, crop } => extract_scan(page, *code, crop.as_ref(), backends),
        }
    }
}

fn extract_coordinate(page: &PageResource, geometry: &str, backends: &Backends) -> FieldOutcome {
    match backends
        .region_text
        .extract_region(page.path(), geometry, page.work_dir())
    {
        Ok(text) => FieldOutcome::from_text(text),
        Err(e) => {
            warn!("Region extraction on page {} failed: {}", page.number(), e);
            FieldOutcome::Unresolved
        }
    }
}

fn extract_regex(
    page: &mut PageResource,
    pattern: &Regex,
    sources: &[TextSource],
    backends: &Backends,
) -> FieldOutcome {
    for &source in sources {
        let text = match page.text(source, backends) {
            Ok(text) => text,
            Err(_) => continue,
        };
        if let Some(value) = first_capture(pattern, &text) {
            debug!("Pattern matched via {} on page {}", source, page.number());
            return FieldOutcome::Resolved(value);
        }
        debug!("Pattern did not match {} text on page {}", source, page.number());
    }
    FieldOutcome::Unresolved
}

fn extract_scan(
    page: &mut PageResource,
    code: CodeKind,
    crop: Option<&CropBox>,
    backends: &Backends,
) -> Result<FieldOutcome, FileError> {
    let candidates = match page.images(backends) {
        Ok(images) => images,
        Err(e) => {
            warn!("Image extraction on page {} failed, using rendered page: {}", page.number(), e);
            page.raster(backends).unwrap_or_else(|e| {
                warn!("Rendering page {} failed: {}", page.number(), e);
                Vec::new()
            })
        }
    };

    for path in &candidates {
        let img = open_image(path)?;
        if let Some(value) = decode(&img, code, path, backends)? {
            return Ok(FieldOutcome::from_text(value));
        }
    }

    let Some(crop) = crop else {
        return Ok(FieldOutcome::Unresolved);
    };

    let raster = page.raster(backends).map_err(|source| FileError::Rasterize {
        page: page.number(),
        source,
    })?;
    let Some(rendered) = raster.first() else {
        return Ok(FieldOutcome::Unresolved);
    };
    let img = open_image(rendered)?;
    let cropped = crop_image(&img, crop).map_err(|reason| FileError::Image {
        path: rendered.clone(),
        reason,
    })?;

    Ok(decode(&cropped, code, rendered, backends)?
        .map(FieldOutcome::from_text)
        .unwrap_or(FieldOutcome::Unresolved))
}

fn open_image(path: &Path) -> Result<DynamicImage, FileError> {
    image::open(path).map_err(|e| FileError::Image {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn decode(
    img: &DynamicImage,
    code: CodeKind,
    path: &Path,
    backends: &Backends,
) -> Result<Option<String>, FileError> {
    backends.decoder.decode(img, code).map_err(|e| FileError::Image {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
