//! In-process OCR using `pure-onnx-ocr`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, info};

use super::OcrEngine;
use crate::error::BackendError;

fn engine_error(reason: impl std::fmt::Display) -> BackendError {
    BackendError::Engine {
        backend: "pure-onnx-ocr".to_string(),
        reason: reason.to_string(),
    }
}

type Engine = pure_onnx_ocr::engine::OcrEngine;

fn build_engine(model_dir: &Path) -> Result<Engine, BackendError> {
    pure_onnx_ocr::engine::OcrEngineBuilder::new()
        .det_model_path(model_dir.join("det.onnx"))
        .rec_model_path(model_dir.join("rec.onnx"))
        .dictionary_path(model_dir.join("dict.txt"))
        .build()
        .map_err(engine_error)
}

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
///
/// Engines are checked out of an idle pool for the duration of one image, so
/// concurrent workers each run their own engine. The pool grows on demand.
pub struct OnnxOcr {
    model_dir: PathBuf,
    pool: EnginePool<Engine>,
}

impl OnnxOcr {
    /// Load `det.onnx`, `rec.onnx` and `dict.txt` from a directory.
    pub fn from_dir(model_dir: &Path) -> Result<Self, BackendError> {
        let engine = build_engine(model_dir)?;
        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());
        Ok(Self {
            model_dir: model_dir.to_path_buf(),
            pool: EnginePool::with(engine),
        })
    }
}

/// Idle engines; the lock covers only taking one out and putting it back.
struct EnginePool<T> {
    idle: Mutex<Vec<T>>,
}

impl<T> EnginePool<T> {
    fn with(engine: T) -> Self {
        Self {
            idle: Mutex::new(vec![engine]),
        }
    }

    fn checkout(&self, build: impl FnOnce() -> Result<T, BackendError>) -> Result<T, BackendError> {
        let idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match idle {
            Some(engine) => Ok(engine),
            None => {
                debug!("All OCR engines busy, loading another");
                build()
            }
        }
    }

    fn checkin(&self, engine: T) {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).push(engine);
    }
}

impl OcrEngine for OnnxOcr {
    fn recognize(&self, image: &Path, _work_dir: &Path) -> Result<String, BackendError> {
        let start = Instant::now();
        let img = image::open(image).map_err(engine_error)?;

        let engine = self.pool.checkout(|| build_engine(&self.model_dir))?;
        let results = engine.run_from_image(&img).map_err(engine_error);
        self.pool.checkin(engine);
        let results = results?;

        // Reading order: 20px rows, then left to right.
        let mut lines: Vec<(i64, f64, String)> = results
            .iter()
            .map(|r| {
                let (x, y) = r
                    .bounding_box
                    .exterior()
                    .coords()
                    .fold((f64::MAX, f64::MAX), |(x, y), c| (x.min(c.x), y.min(c.y)));
                ((y / 20.0) as i64, x, r.text.replace("[UNK]", " "))
            })
            .collect();
        lines.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        debug!(
            "OCR of {:?}: {} regions in {}ms",
            image,
            lines.len(),
            start.elapsed().as_millis()
        );

        Ok(lines
            .into_iter()
            .map(|(_, _, text)| text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_engines_do_not_block_checkout() {
        let pool = EnginePool::with(1u32);
        let mut built = 1u32;

        let first = pool.checkout(|| unreachable!()).unwrap();
        let second = pool
            .checkout(|| {
                built += 1;
                Ok(built)
            })
            .unwrap();
        assert_eq!((first, second), (1, 2));

        pool.checkin(second);
        pool.checkin(first);
        assert_eq!(pool.checkout(|| unreachable!()).unwrap(), 1);
        assert_eq!(pool.checkout(|| unreachable!()).unwrap(), 2);
    }

    #[test]
    fn test_failed_build_is_reported() {
        let pool = EnginePool::with(0u8);
        let _busy = pool.checkout(|| unreachable!()).unwrap();
        assert!(pool.checkout(|| Err(engine_error("missing det.onnx"))).is_err());
    }
}
