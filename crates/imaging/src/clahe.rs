//! Contrast-limited adaptive histogram equalisation on a single 8-bit plane.

const BINS: usize = 256;

/// Tuning for [`clahe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    /// Histogram clip limit, relative to a perfectly flat histogram of the tile.
    pub clip_limit: f32,
    /// Number of tile columns.
    pub tiles_x: u32,
    /// Number of tile rows.
    pub tiles_y: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tiles_x: 8,
            tiles_y: 8,
        }
    }
}

/// Equalise `plane` (row-major, `width * height` samples) tile by tile.
///
/// Each tile gets its own clipped-histogram lookup table; output samples are bilinearly
/// interpolated between the four nearest tile centres so tile seams do not show. Images
/// smaller than the grid are handled by shrinking the grid to the image size.
///
/// # Panics
///
/// Panics if `plane.len() != width * height`.
pub fn clahe(plane: &[u8], width: u32, height: u32, params: &ClaheParams) -> Vec<u8> {
    assert_eq!(plane.len(), (width as usize) * (height as usize));
    if plane.is_empty() {
        return Vec::new();
    }

    let tiles_x = params.tiles_x.clamp(1, width) as usize;
    let tiles_y = params.tiles_y.clamp(1, height) as usize;
    let (w, h) = (width as usize, height as usize);

    let mut luts = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        let (y0, y1) = (ty * h / tiles_y, (ty + 1) * h / tiles_y);
        for tx in 0..tiles_x {
            let (x0, x1) = (tx * w / tiles_x, (tx + 1) * w / tiles_x);
            luts.push(tile_lut(plane, w, x0..x1, y0..y1, params.clip_limit));
        }
    }

    let tile_w = w as f32 / tiles_x as f32;
    let tile_h = h as f32 / tiles_y as f32;
    let mut out = Vec::with_capacity(plane.len());

    for y in 0..h {
        let (ty0, ty1, wy) = neighbours(y, tile_h, tiles_y);
        for x in 0..w {
            let (tx0, tx1, wx) = neighbours(x, tile_w, tiles_x);
            let v = plane[y * w + x] as usize;

            let top = (1.0 - wx) * f32::from(luts[ty0 * tiles_x + tx0][v])
                + wx * f32::from(luts[ty0 * tiles_x + tx1][v]);
            let bottom = (1.0 - wx) * f32::from(luts[ty1 * tiles_x + tx0][v])
                + wx * f32::from(luts[ty1 * tiles_x + tx1][v]);

            out.push(((1.0 - wy) * top + wy * bottom).round().clamp(0.0, 255.0) as u8);
        }
    }

    out
}

/// Lower tile index, upper tile index and interpolation weight for one coordinate.
fn neighbours(pos: usize, tile_size: f32, tiles: usize) -> (usize, usize, f32) {
    let centre = (pos as f32 + 0.5) / tile_size - 0.5;
    if centre <= 0.0 {
        return (0, 0, 0.0);
    }
    let lower = (centre.floor() as usize).min(tiles - 1);
    let upper = (lower + 1).min(tiles - 1);
    let weight = if upper == lower {
        0.0
    } else {
        centre - lower as f32
    };
    (lower, upper, weight)
}

fn tile_lut(
    plane: &[u8],
    stride: usize,
    xs: std::ops::Range<usize>,
    ys: std::ops::Range<usize>,
    clip_limit: f32,
) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in ys {
        for &v in &plane[y * stride + xs.start..y * stride + xs.end] {
            hist[v as usize] += 1;
        }
    }

    let area: u32 = hist.iter().sum();
    let mut lut = [0u8; BINS];
    if area == 0 {
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }
        return lut;
    }

    let limit = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let share = excess / BINS as u32;
    let residual = (excess % BINS as u32) as usize;
    for count in hist.iter_mut() {
        *count += share;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for idx in (0..BINS).step_by(step).take(residual) {
            hist[idx] += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (slot, count) in lut.iter_mut().zip(hist.iter()) {
        cumulative += count;
        *slot = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_plane_stays_uniform() {
        let plane = vec![90u8; 32 * 24];
        let out = clahe(&plane, 32, 24, &ClaheParams::default());

        assert_eq!(out.len(), plane.len());
        assert!(out.iter().all(|&v| v == out[0]));
    }

    #[test]
    fn low_contrast_ramp_is_stretched() {
        let (w, h) = (256u32, 256u32);
        let plane: Vec<u8> = (0..h)
            .flat_map(|y| (0..w).map(move |x| 100 + ((x + y) % 20) as u8))
            .collect();

        let out = clahe(&plane, w, h, &ClaheParams::default());

        let in_span = plane.iter().max().unwrap() - plane.iter().min().unwrap();
        let out_span = out.iter().max().unwrap() - out.iter().min().unwrap();
        assert!(out_span > in_span, "span {in_span} -> {out_span}");
    }

    #[test]
    fn tiny_image_shrinks_grid() {
        let plane = vec![10, 200, 60, 120, 30, 250];
        let out = clahe(&plane, 3, 2, &ClaheParams::default());
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn empty_plane_is_empty() {
        assert!(clahe(&[], 0, 0, &ClaheParams::default()).is_empty());
    }
}
