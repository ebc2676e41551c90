//! sRGB <-> CIE L*a*b* conversion (D65 white point).
//!
//! Lightness is stored as an 8-bit plane scaled to `0..=255` so it can be histogram-equalised
//! directly. The chroma channels stay in floating point so that the round trip does not add
//! colour banding on top of the lightness change.

use image::{Rgb, RgbImage};

const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;
const EPSILON: f32 = 0.008_856;
const KAPPA: f32 = 903.3;

/// An image split into an equalisable lightness plane and untouched chroma planes.
pub(crate) struct LabPlanes {
    pub(crate) lightness: Vec<u8>,
    a: Vec<f32>,
    b: Vec<f32>,
}

impl LabPlanes {
    pub(crate) fn from_rgb(img: &RgbImage) -> Self {
        let len = (img.width() as usize) * (img.height() as usize);
        let mut lightness = Vec::with_capacity(len);
        let mut a = Vec::with_capacity(len);
        let mut b = Vec::with_capacity(len);

        for pixel in img.pixels() {
            let (l, pa, pb) = rgb_to_lab(pixel.0);
            lightness.push((l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8);
            a.push(pa);
            b.push(pb);
        }

        Self { lightness, a, b }
    }

    pub(crate) fn to_rgb(&self, width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let idx = (y as usize) * (width as usize) + x as usize;
            let l = f32::from(self.lightness[idx]) * 100.0 / 255.0;
            Rgb(lab_to_rgb(l, self.a[idx], self.b[idx]))
        })
    }
}

fn srgb_to_linear(c: u8) -> f32 {
    let c = f32::from(c) / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> u8 {
    let c = if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    let cubed = f * f * f;
    if cubed > EPSILON {
        cubed
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

pub(crate) fn rgb_to_lab([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

    let l = if y > EPSILON {
        116.0 * y.cbrt() - 16.0
    } else {
        KAPPA * y
    };
    let fy = lab_f(y);

    (l, 500.0 * (lab_f(x) - fy), 200.0 * (fy - lab_f(z)))
}

pub(crate) fn lab_to_rgb(l: f32, a: f32, b: f32) -> [u8; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let y = if l > KAPPA * EPSILON {
        fy * fy * fy
    } else {
        l / KAPPA
    };
    let x = lab_f_inv(fx) * WHITE_X;
    let z = lab_f_inv(fz) * WHITE_Z;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
    let b = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    [linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_and_black_hit_lightness_extremes() {
        let (l_white, a_white, b_white) = rgb_to_lab([255, 255, 255]);
        assert!((l_white - 100.0).abs() < 0.5);
        assert!(a_white.abs() < 0.5 && b_white.abs() < 0.5);

        let (l_black, _, _) = rgb_to_lab([0, 0, 0]);
        assert!(l_black.abs() < 0.5);
    }

    #[test]
    fn planes_round_trip_within_quantisation_error() {
        let img = RgbImage::from_fn(9, 7, |x, y| {
            Rgb([(x * 28) as u8, (y * 36) as u8, ((x + y) * 16) as u8])
        });

        let planes = LabPlanes::from_rgb(&img);
        let back = planes.to_rgb(9, 7);

        for (orig, got) in img.pixels().zip(back.pixels()) {
            for channel in 0..3 {
                let diff = i16::from(orig.0[channel]) - i16::from(got.0[channel]);
                assert!(diff.abs() <= 3, "{orig:?} -> {got:?}");
            }
        }
    }
}
