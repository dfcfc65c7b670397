//! QR and Code 128 decoding with rxing, plus image cropping.

use image::DynamicImage;
use rxing::BarcodeFormat;
use tracing::trace;

use super::CodeDecoder;
use crate::error::BackendError;
use crate::models::{CodeKind, CropBox};

/// Decoder backed by rxing's luma-buffer helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RxingDecoder;

impl CodeDecoder for RxingDecoder {
    fn decode(&self, image: &DynamicImage, kind: CodeKind) -> Result<Option<String>, BackendError> {
        let luma = image.to_luma8();
        let (width, height) = luma.dimensions();
        let pixels = luma.into_raw();

        let format = match kind {
            CodeKind::Qr => BarcodeFormat::QR_CODE,
            CodeKind::Barcode128 => BarcodeFormat::CODE_128,
        };

        match rxing::helpers::detect_in_luma(pixels.clone(), width, height, Some(format)) {
            Ok(result) => return Ok(Some(result.getText().to_string())),
            Err(e) => trace!("No {} found: {:?}", kind, e),
        }

        // A page can carry several QR codes that confuse the single reader.
        if kind == CodeKind::Qr {
            if let Ok(results) = rxing::helpers::detect_multiple_in_luma(pixels, width, height) {
                if let Some(found) = results
                    .iter()
                    .find(|r| *r.getBarcodeFormat() == BarcodeFormat::QR_CODE)
                {
                    return Ok(Some(found.getText().to_string()));
                }
            }
        }

        Ok(None)
    }
}

/// Crop `image` to `crop`, clipped to the image bounds.
pub fn crop_image(image: &DynamicImage, crop: &CropBox) -> Result<DynamicImage, String> {
    let max_x = crop.max_x.min(image.width());
    let max_y = crop.max_y.min(image.height());
    if crop.min_x >= max_x || crop.min_y >= max_y {
        return Err(format!(
            "crop box {:?} lies outside the {}x{} image",
            crop,
            image.width(),
            image.height()
        ));
    }
    Ok(image.crop_imm(crop.min_x, crop.min_y, max_x - crop.min_x, max_y - crop.min_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_blank_image_has_no_code() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255])));
        assert_eq!(RxingDecoder.decode(&blank, CodeKind::Qr).unwrap(), None);
        assert_eq!(RxingDecoder.decode(&blank, CodeKind::Barcode128).unwrap(), None);
    }

    #[test]
    fn test_crop_clips_to_bounds() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(100, 50));
        let crop = CropBox {
            min_x: 10,
            min_y: 10,
            max_x: 500,
            max_y: 40,
        };
        let cropped = crop_image(&img, &crop).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (90, 30));

        let outside = CropBox {
            min_x: 200,
            min_y: 0,
            max_x: 300,
            max_y: 10,
        };
        assert!(crop_image(&img, &outside).is_err());
    }
}
