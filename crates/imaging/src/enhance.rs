//! Best-effort enhancement of uploaded scans.

use crate::clahe::{clahe, ClaheParams};
use crate::color::LabPlanes;
use crate::ImagingError;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Centre weight of the sharpening kernel; the eight neighbours each weigh -1.
const SHARPEN_CENTRE: i32 = 9;

/// Image enhancement with configurable CLAHE tuning.
///
/// The default matches what the upload endpoint uses: clip limit 3.0 over an 8x8 grid.
#[derive(Debug, Clone, Default)]
pub struct ImageEnhancer {
    clahe: ClaheParams,
}

impl ImageEnhancer {
    /// Creates an enhancer with explicit CLAHE parameters.
    pub fn new(clahe: ClaheParams) -> Self {
        Self { clahe }
    }

    /// Enhances `bytes` and returns PNG-encoded output.
    ///
    /// # Errors
    ///
    /// Returns `ImagingError` if:
    /// - `bytes` is empty,
    /// - the payload cannot be decoded as PNG or JPEG,
    /// - the result cannot be encoded as PNG.
    pub fn try_enhance(&self, bytes: &[u8]) -> Result<Vec<u8>, ImagingError> {
        if bytes.is_empty() {
            return Err(ImagingError::EmptyInput);
        }

        let decoded = image::load_from_memory(bytes).map_err(ImagingError::Decode)?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut planes = LabPlanes::from_rgb(&rgb);
        planes.lightness = clahe(&planes.lightness, width, height, &self.clahe);
        let equalised = planes.to_rgb(width, height);

        let sharpened = sharpen(&equalised);

        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(sharpened)
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .map_err(ImagingError::Encode)?;

        tracing::debug!(
            width,
            height,
            input_bytes = bytes.len(),
            output_bytes = buf.len(),
            "image enhanced"
        );

        Ok(buf)
    }

    /// Enhances `bytes`, falling back to the untouched input on any failure.
    pub fn enhance(&self, bytes: &[u8]) -> Vec<u8> {
        match self.try_enhance(bytes) {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(error = %e, "image enhancement failed, returning original");
                bytes.to_vec()
            }
        }
    }
}

/// Enhance with default parameters; see [`ImageEnhancer::try_enhance`].
pub fn try_enhance_image(bytes: &[u8]) -> Result<Vec<u8>, ImagingError> {
    ImageEnhancer::default().try_enhance(bytes)
}

/// Enhance with default parameters; never fails, see [`ImageEnhancer::enhance`].
pub fn enhance_image(bytes: &[u8]) -> Vec<u8> {
    ImageEnhancer::default().enhance(bytes)
}

/// Apply the 3x3 sharpen kernel `[[-1,-1,-1],[-1,9,-1],[-1,-1,-1]]` per channel.
///
/// Edge pixels reuse the nearest in-bounds neighbour, so the border is sharpened like the
/// interior instead of being left black.
pub fn sharpen(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let max_x = i64::from(width) - 1;
    let max_y = i64::from(height) - 1;

    RgbImage::from_fn(width, height, |x, y| {
        let mut acc = [0i32; 3];
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = (i64::from(x) + dx).clamp(0, max_x) as u32;
                let ny = (i64::from(y) + dy).clamp(0, max_y) as u32;
                let weight = if dx == 0 && dy == 0 {
                    SHARPEN_CENTRE
                } else {
                    -1
                };
                let sample = img.get_pixel(nx, ny).0;
                for (slot, value) in acc.iter_mut().zip(sample) {
                    *slot += weight * i32::from(value);
                }
            }
        }
        Rgb(acc.map(|v| v.clamp(0, 255) as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat};

    fn encode(img: RgbImage, format: ImageOutputFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    fn sample_scan() -> RgbImage {
        RgbImage::from_fn(40, 30, |x, y| {
            let v = 90 + ((x * 3 + y * 2) % 40) as u8;
            Rgb([v, v, v.saturating_add(5)])
        })
    }

    #[test]
    fn enhance_png_returns_png_with_same_dimensions() {
        let input = encode(sample_scan(), ImageOutputFormat::Png);

        let output = try_enhance_image(&input).unwrap();

        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn enhance_jpeg_is_converted_to_png() {
        let input = encode(sample_scan(), ImageOutputFormat::Jpeg(90));

        let output = enhance_image(&input);

        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn garbage_input_is_returned_unchanged() {
        let input = b"definitely not an image".to_vec();

        assert!(matches!(
            try_enhance_image(&input),
            Err(ImagingError::Decode(_))
        ));
        assert_eq!(enhance_image(&input), input);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(try_enhance_image(&[]), Err(ImagingError::EmptyInput)));
        assert!(enhance_image(&[]).is_empty());
    }

    #[test]
    fn sharpen_leaves_flat_regions_alone() {
        let flat = RgbImage::from_pixel(5, 5, Rgb([120, 60, 200]));
        assert_eq!(sharpen(&flat), flat);
    }

    #[test]
    fn sharpen_amplifies_an_isolated_spot() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb([100, 100, 100]));
        img.put_pixel(1, 1, Rgb([120, 120, 120]));

        let out = sharpen(&img);

        // 9 * 120 - 8 * 100 = 280, clamped
        assert_eq!(out.get_pixel(1, 1).0, [255, 255, 255]);
        // 9 * 100 - 7 * 100 - 120 = 80
        assert_eq!(out.get_pixel(0, 1).0[0], 80);
    }
}
