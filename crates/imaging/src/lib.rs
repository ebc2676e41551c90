//! EHR Image Enhancement
//!
//! This crate improves the legibility of uploaded scans before they are shown to clinicians.
//!
//! ## Pipeline
//!
//! 1. Decode the upload (PNG or JPEG) and convert it to 8-bit RGB
//! 2. Convert to CIE L\*a\*b\* and equalise only the lightness channel with CLAHE
//!    (contrast-limited adaptive histogram equalisation), leaving colour untouched
//! 3. Convert back to RGB and apply a 3x3 sharpening kernel
//! 4. Encode the result as PNG
//!
//! Enhancement is best-effort: [`enhance_image`] never fails and hands back the original
//! bytes when the input cannot be processed. Use [`try_enhance_image`] when the cause matters.
//!
//! ## Example Usage
//!
//! ```no_run
//! let upload = std::fs::read("scan.jpg").unwrap();
//! let png = ehr_imaging::enhance_image(&upload);
//! std::fs::write("scan-enhanced.png", png).unwrap();
//! ```

mod clahe;
mod color;
mod enhance;

pub use clahe::{clahe, ClaheParams};
pub use enhance::{enhance_image, sharpen, try_enhance_image, ImageEnhancer};

/// Errors that can occur while enhancing an image
#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    /// No bytes were supplied
    #[error("image payload is empty")]
    EmptyInput,

    /// The payload is not an image format we can decode
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The enhanced image could not be written as PNG
    #[error("failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),
}
