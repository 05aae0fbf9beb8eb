//! Marker detection on a full frame: binarize, find quads, decode, match.

use image::{GrayImage, RgbImage};
use log::debug;
use nalgebra::Point2;
use puttrack_core::GrayImageView;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::decode::QuadDecoder;
use crate::quads::find_quads;
use crate::threshold::dark_mask;
use crate::{Dictionary, DictionaryError, Matcher};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for [`MarkerDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectParams {
    /// Border width in cells (usually 1).
    pub border_bits: usize,
    /// Accept codes within this many flipped bits.
    pub max_hamming: u8,
    /// Required fraction of black border cells.
    pub min_border_score: f64,
    /// Outlines shorter than this are ignored.
    pub min_perimeter_px: f64,
    /// Polygon simplification tolerance relative to the outline length.
    pub approx_epsilon_frac: f64,
    /// Keep only the best detection per id.
    pub dedup_by_id: bool,
}

impl Default for MarkerDetectParams {
    fn default() -> Self {
        Self {
            border_bits: 1,
            max_hamming: 1,
            min_border_score: 0.85,
            min_perimeter_px: 40.0,
            approx_epsilon_frac: 0.03,
            dedup_by_id: true,
        }
    }
}

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    /// Corners in the marker's own TL, TR, BR, BL order (rotation undone).
    pub corners: [Point2<f64>; 4],
    /// Mean of the four corners.
    pub center: Point2<f64>,
    pub rotation: u8,
    pub hamming: u8,
    pub border_score: f64,
    /// `border_score` discounted by the fraction of corrected bits.
    pub score: f64,
}

/// Detects dark square fiducials of one dictionary.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    matcher: Matcher,
    params: MarkerDetectParams,
}

impl MarkerDetector {
    pub fn new(dict: Dictionary, params: MarkerDetectParams) -> Result<Self, DictionaryError> {
        dict.validate()?;
        Ok(Self {
            matcher: Matcher::new(dict, params.max_hamming),
            params,
        })
    }

    pub fn params(&self) -> &MarkerDetectParams {
        &self.params
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.matcher.dictionary()
    }

    pub fn detect_rgb(&self, frame: &RgbImage) -> Vec<MarkerDetection> {
        self.detect(&image::imageops::grayscale(frame))
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, gray), fields(width = gray.width(), height = gray.height()))
    )]
    pub fn detect(&self, gray: &GrayImage) -> Vec<MarkerDetection> {
        let bits = self.dictionary().marker_size;
        let Some(mut decoder) =
            QuadDecoder::new(bits, self.params.border_bits, self.params.min_border_score)
        else {
            return Vec::new();
        };
        let Some(view) =
            GrayImageView::new(gray.width() as usize, gray.height() as usize, gray.as_raw())
        else {
            return Vec::new();
        };

        let (mask, thr) = dark_mask(gray);
        let quads = find_quads(
            &mask,
            self.params.min_perimeter_px,
            self.params.approx_epsilon_frac,
        );
        debug!("marker scan: threshold {thr}, {} candidate quads", quads.len());

        let bit_count = self.dictionary().bit_count().max(1) as f64;
        let mut out = Vec::new();
        for quad in &quads {
            let Some(obs) = decoder.decode(&view, &quad.corners) else {
                continue;
            };
            let Some(m) = self.matcher.match_code(obs.code) else {
                continue;
            };
            let corners: [Point2<f64>; 4] =
                std::array::from_fn(|k| quad.corners[(k + m.rotation as usize) % 4]);
            let center = Point2::from(
                corners.iter().map(|p| p.coords).sum::<nalgebra::Vector2<f64>>() / 4.0,
            );
            let score = (obs.border_score * (1.0 - m.hamming as f64 / bit_count)).clamp(0.0, 1.0);
            out.push(MarkerDetection {
                id: m.id,
                corners,
                center,
                rotation: m.rotation,
                hamming: m.hamming,
                border_score: obs.border_score,
                score,
            });
        }

        if self.params.dedup_by_id {
            out = dedup_by_id_keep_best(out);
        }
        debug!("marker scan: {} markers decoded", out.len());
        out
    }
}

fn dedup_by_id_keep_best(mut dets: Vec<MarkerDetection>) -> Vec<MarkerDetection> {
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut seen = HashSet::new();
    dets.retain(|d| seen.insert(d.id));
    dets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotate_code_u64;
    use image::Luma;

    fn dict() -> Dictionary {
        Dictionary::new("test4", 4, vec![0x1e2d, 0x8b53, 0xc6a1, 0x3779]).expect("dict")
    }

    fn paint_marker(img: &mut GrayImage, code: u64, bits: usize, x0: u32, y0: u32, cell: u32) {
        let cells = bits as u32 + 2;
        for cy in 0..cells {
            for cx in 0..cells {
                let border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
                let idx = (cy.saturating_sub(1) * bits as u32 + cx.saturating_sub(1)) as usize;
                let black = border || (code >> idx) & 1 == 1;
                let v = if black { 0u8 } else { 255u8 };
                for yy in 0..cell {
                    for xx in 0..cell {
                        img.put_pixel(x0 + cx * cell + xx, y0 + cy * cell + yy, Luma([v]));
                    }
                }
            }
        }
    }

    #[test]
    fn detects_and_identifies_markers() {
        let d = dict();
        let mut img = GrayImage::from_pixel(320, 240, Luma([255u8]));
        paint_marker(&mut img, d.codes[0], 4, 20, 20, 10);
        paint_marker(&mut img, d.codes[3], 4, 200, 140, 12);

        let detector = MarkerDetector::new(d, MarkerDetectParams::default()).expect("detector");
        let mut dets = detector.detect(&img);
        dets.sort_by_key(|m| m.id);

        assert_eq!(dets.iter().map(|m| m.id).collect::<Vec<_>>(), vec![0, 3]);
        assert!((dets[0].center - Point2::new(50.0, 50.0)).norm() < 1.0);
        assert!((dets[1].center - Point2::new(236.0, 176.0)).norm() < 1.0);
        assert!(dets.iter().all(|m| m.hamming == 0 && m.rotation == 0));
    }

    #[test]
    fn reports_rotation_and_reorders_corners() {
        let d = dict();
        let mut img = GrayImage::from_pixel(160, 160, Luma([255u8]));
        paint_marker(&mut img, rotate_code_u64(d.codes[2], 4, 1), 4, 40, 40, 10);

        let detector = MarkerDetector::new(d, MarkerDetectParams::default()).expect("detector");
        let dets = detector.detect(&img);
        assert_eq!(dets.len(), 1);
        let m = &dets[0];
        assert_eq!((m.id, m.rotation), (2, 1));
        // The marker's own top-left corner is the observed top-right one.
        assert!((m.corners[0] - Point2::new(99.5, 39.5)).norm() < 1.0);
    }

    #[test]
    fn blank_frame_yields_nothing() {
        let img = GrayImage::from_pixel(64, 64, Luma([200u8]));
        let detector = MarkerDetector::new(dict(), MarkerDetectParams::default()).expect("detector");
        assert!(detector.detect(&img).is_empty());
    }
}
