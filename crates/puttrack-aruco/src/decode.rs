//! Bit sampling and decoding of one marker quad.

use nalgebra::Point2;
use puttrack_core::{homography_from_4pt, GrayImageView, Homography};

use crate::threshold::otsu_threshold_from_samples;

/// Raw bits read from one quad, before dictionary matching.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MarkerObservation {
    pub code: u64,
    /// Fraction of border cells read as black.
    pub border_score: f64,
}

/// Sample positions in the unit square, row-major: `cy * cells + cx`.
struct SampleGrid {
    cells: usize,
    points: Vec<Point2<f64>>,
    threshold_points: Vec<Point2<f64>>,
}

impl SampleGrid {
    fn new(bits: usize, border: usize) -> Option<Self> {
        if bits == 0 || bits * bits > 64 {
            return None;
        }
        let cells = bits + 2 * border;
        let step = 1.0 / cells as f64;

        let points = (0..cells)
            .flat_map(|cy| {
                (0..cells).map(move |cx| {
                    Point2::new((cx as f64 + 0.5) * step, (cy as f64 + 0.5) * step)
                })
            })
            .collect();

        // Denser lattice so the per-marker threshold sees both levels.
        const THRESH_SUBDIV: usize = 3;
        let grid = cells * THRESH_SUBDIV;
        let tstep = 1.0 / grid as f64;
        let threshold_points = (0..grid)
            .flat_map(|ty| {
                (0..grid).map(move |tx| {
                    Point2::new((tx as f64 + 0.5) * tstep, (ty as f64 + 0.5) * tstep)
                })
            })
            .collect();

        Some(Self {
            cells,
            points,
            threshold_points,
        })
    }
}

/// Reads the bit grid of a quad given its image corners.
///
/// Holds scratch buffers, so reuse one decoder across the quads of a frame.
pub(crate) struct QuadDecoder {
    bits: usize,
    border: usize,
    min_border_score: f64,
    grid: SampleGrid,
    unit_square: [Point2<f64>; 4],
    scratch_bits: Vec<u8>,
    scratch_thr: Vec<u8>,
}

impl QuadDecoder {
    pub fn new(bits: usize, border: usize, min_border_score: f64) -> Option<Self> {
        let grid = SampleGrid::new(bits, border)?;
        Some(Self {
            bits,
            border,
            min_border_score,
            scratch_bits: Vec::with_capacity(grid.points.len()),
            scratch_thr: Vec::with_capacity(grid.threshold_points.len()),
            grid,
            unit_square: [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
        })
    }

    /// `corners` must be ordered clockwise in image coordinates.
    pub fn decode(
        &mut self,
        img: &GrayImageView<'_>,
        corners: &[Point2<f64>; 4],
    ) -> Option<MarkerObservation> {
        let h = homography_from_4pt(&self.unit_square, corners)?;
        self.sample(img, &h)?;
        decode_samples(
            &self.scratch_bits,
            &self.scratch_thr,
            self.grid.cells,
            self.bits,
            self.border,
            self.min_border_score,
        )
    }

    fn sample(&mut self, img: &GrayImageView<'_>, h: &Homography) -> Option<()> {
        self.scratch_bits.clear();
        for p in &self.grid.points {
            let q = h.try_apply(*p)?;
            self.scratch_bits.push(sample_mean_3x3(img, q.x, q.y)?);
        }

        self.scratch_thr.clear();
        for p in &self.grid.threshold_points {
            if let Some(v) = h.try_apply(*p).and_then(|q| sample_mean_3x3(img, q.x, q.y)) {
                self.scratch_thr.push(v);
            }
        }
        Some(())
    }
}

fn decode_samples(
    samples: &[u8],
    thr_samples: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    min_border_score: f64,
) -> Option<MarkerObservation> {
    if samples.len() != cells * cells {
        return None;
    }

    let thr = if thr_samples.is_empty() {
        otsu_threshold_from_samples(samples)
    } else {
        otsu_threshold_from_samples(thr_samples)
    };

    let mut border_ok = 0u32;
    let mut border_total = 0u32;
    let mut code = 0u64;

    for cy in 0..cells {
        for cx in 0..cells {
            let is_black = samples[cy * cells + cx] < thr;
            let in_border = cx < border || cy < border || cx >= border + bits || cy >= border + bits;
            if in_border {
                border_total += 1;
                border_ok += is_black as u32;
            } else if is_black {
                code |= 1u64 << ((cy - border) * bits + (cx - border));
            }
        }
    }

    let border_score = if border_total > 0 {
        border_ok as f64 / border_total as f64
    } else {
        1.0
    };
    (border_score >= min_border_score).then_some(MarkerObservation { code, border_score })
}

fn sample_mean_3x3(img: &GrayImageView<'_>, x: f64, y: f64) -> Option<u8> {
    let ix = x.floor() as i64;
    let iy = y.floor() as i64;
    if ix < 1 || iy < 1 || ix + 1 >= img.width as i64 || iy + 1 >= img.height as i64 {
        return None;
    }

    let mut sum = 0u32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += img.get(ix + dx, iy + dy) as u32;
        }
    }
    Some((sum / 9) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_pixels(code: u64, bits: usize, cell_px: usize) -> (usize, Vec<u8>) {
        let cells = bits + 2;
        let side = cells * cell_px;
        let mut data = vec![255u8; side * side];
        for y in 0..side {
            for x in 0..side {
                let (cx, cy) = (x / cell_px, y / cell_px);
                let border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
                let black = border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
                if black {
                    data[y * side + x] = 0;
                }
            }
        }
        (side, data)
    }

    #[test]
    fn decodes_axis_aligned_quad() {
        let code = 0x8b53;
        let (side, data) = marker_pixels(code, 4, 10);
        let view = GrayImageView::new(side, side, &data).expect("view");
        let s = side as f64;
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ];
        let mut decoder = QuadDecoder::new(4, 1, 0.9).expect("decoder");
        let obs = decoder.decode(&view, &corners).expect("observation");
        assert_eq!(obs.code, code);
        assert_eq!(obs.border_score, 1.0);
    }

    #[test]
    fn white_square_fails_border_check() {
        let data = vec![255u8; 60 * 60];
        let view = GrayImageView::new(60, 60, &data).expect("view");
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 0.0),
            Point2::new(60.0, 60.0),
            Point2::new(0.0, 60.0),
        ];
        let mut decoder = QuadDecoder::new(4, 1, 0.85).expect("decoder");
        assert!(decoder.decode(&view, &corners).is_none());
    }
}
