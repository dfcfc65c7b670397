//! In-process PDF handling using lopdf and pdf-extract.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{ImageExtractor, PageSplitter, TextExtractor};
use crate::error::BackendError;

fn engine_error(backend: &str, reason: impl ToString) -> BackendError {
    BackendError::Engine {
        backend: backend.to_string(),
        reason: reason.to_string(),
    }
}

/// Load a document, unlocking empty-password encryption.
fn load_document(path: &Path, backend: &str) -> Result<Document, BackendError> {
    let mut doc = Document::load(path).map_err(|e| engine_error(backend, e))?;

    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|_| engine_error(backend, "document is encrypted"))?;
        debug!("Decrypted {:?} with empty password", path);
    }

    if doc.get_pages().is_empty() {
        return Err(engine_error(backend, "document has no pages"));
    }
    Ok(doc)
}

/// Page splitter writing `<stem>_<n>.pdf` for every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfSplitter;

impl PageSplitter for LopdfSplitter {
    fn split(&self, file: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BackendError> {
        let doc = load_document(file, "lopdf")?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());

        let mut pages = Vec::with_capacity(page_numbers.len());
        for &number in &page_numbers {
            let mut single = doc.clone();
            let others: Vec<u32> = page_numbers.iter().copied().filter(|n| *n != number).collect();
            single.delete_pages(&others);
            single.prune_objects();

            let out = out_dir.join(format!("{stem}_{number}.pdf"));
            single
                .save(&out)
                .map_err(|e| engine_error("lopdf", format!("failed to write {}: {e}", out.display())))?;
            pages.push(out);
        }

        debug!("Split {:?} into {} pages", file, pages.len());
        Ok(pages)
    }
}

/// Whole-document text through pdf-extract.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePdfText;

impl TextExtractor for NativePdfText {
    fn name(&self) -> &str {
        "native"
    }

    fn extract_text(&self, pdf: &Path, _work_dir: &Path) -> Result<String, BackendError> {
        // pdf-extract panics on some malformed font tables.
        let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(pdf)));
        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(engine_error("pdf-extract", e)),
            Err(_) => Err(engine_error("pdf-extract", "parser panicked")),
        }
    }
}

/// Embedded image extraction from page 1 of a PDF, written out as PNG files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfImages;

impl ImageExtractor for LopdfImages {
    fn extract_images(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BackendError> {
        let doc = load_document(pdf, "lopdf")?;
        let images = page_images(&doc, 1);

        let mut paths = Vec::with_capacity(images.len());
        for (i, img) in images.iter().enumerate() {
            let out = out_dir.join(format!("image_{}.png", i + 1));
            img.save(&out)
                .map_err(|e| engine_error("lopdf", format!("failed to write {}: {e}", out.display())))?;
            paths.push(out);
        }

        debug!("Extracted {} images from {:?}", paths.len(), pdf);
        Ok(paths)
    }
}

fn page_images(doc: &Document, page: u32) -> Vec<DynamicImage> {
    let mut images = Vec::new();

    if let Some(page_id) = doc.get_pages().get(&page) {
        if let Some(resources) = page_resources(doc, *page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = image_from_object(doc, obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }
    }

    if images.is_empty() {
        debug!("No XObject images on page {}, scanning all objects", page);
        images = all_images(doc);
    }
    images
}

fn all_images(doc: &Document) -> Vec<DynamicImage> {
    let mut images = Vec::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();

    for (id, object) in doc.objects.iter() {
        if !seen.insert(*id) {
            continue;
        }
        if let Some(img) = image_from_object(doc, object) {
            images.push(img);
        }
    }
    images
}

fn image_from_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(
                    &stream.content,
                    image::ImageFormat::Jpeg,
                )
                .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping image with unsupported filter");
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    raw_to_image(&data, width, height, color_space, bits)
}

fn raw_to_image(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: i64,
) -> Option<DynamicImage> {
    if bits_per_component != 8 {
        trace!("Unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let pixels = (width as usize) * (height as usize);
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => return None,
    };
    if data.len() < pixels * channels {
        trace!("Image data too short: {} < {}", data.len(), pixels * channels);
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for chunk in data[..pixels * channels].chunks(channels) {
        match chunk {
            [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
            [gray] => rgba.extend_from_slice(&[*gray, *gray, *gray, 255]),
            _ => return None,
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

/// Resources dictionary of a page, following `Parent` inheritance.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
    let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
            return Some(res_dict.clone());
        }
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => page_resources(doc, *parent_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_gray_image() {
        let img = raw_to_image(&[0, 128, 255, 64], 2, 2, b"DeviceGray", 8).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.to_rgba8().get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_raw_image_rejects_short_data() {
        assert!(raw_to_image(&[1, 2, 3], 2, 2, b"DeviceRGB", 8).is_none());
        assert!(raw_to_image(&[1, 2, 3, 4], 2, 2, b"DeviceGray", 1).is_none());
    }

    #[test]
    fn test_invalid_pdf_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.pdf");
        std::fs::write(&bogus, b"not a pdf").unwrap();

        assert!(matches!(
            LopdfSplitter.split(&bogus, dir.path()),
            Err(BackendError::Engine { .. })
        ));
        assert!(NativePdfText.extract_text(&bogus, dir.path()).is_err());
    }
}
