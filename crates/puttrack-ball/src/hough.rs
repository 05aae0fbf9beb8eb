//! Circle search by gradient voting, for masks where no contour passes the
//! shape filters.
//!
//! Edge pixels of the (smoothed) mask vote along their gradient, which on a
//! bright blob points inward, at every distance in the radius range. Circle
//! centres collect votes from the whole rim. Each peak's radius is then the
//! distance shell holding the largest share of edge pixels.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_scharr, vertical_scharr};
use nalgebra::Point2;
use std::f64::consts::PI;

use crate::params::HoughParams;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoughCircle {
    pub center: Point2<f64>,
    pub radius: f64,
    /// Fraction of the circumference backed by edge pixels.
    pub support: f64,
}

#[inline]
fn bilinear_add(accum: &mut [f32], w: usize, x: f64, y: f64, weight: f32) {
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;
    let base = y0 * w + x0;
    accum[base] += weight * (1.0 - fx) * (1.0 - fy);
    accum[base + 1] += weight * fx * (1.0 - fy);
    accum[base + w] += weight * (1.0 - fx) * fy;
    accum[base + w + 1] += weight * fx * fy;
}

/// Circles with radius in `[min_radius, max_radius]`, strongest first.
pub fn find_circles(
    mask: &GrayImage,
    min_radius: f64,
    max_radius: f64,
    params: &HoughParams,
) -> Vec<HoughCircle> {
    let (w, h) = mask.dimensions();
    if w < 4 || h < 4 || max_radius < min_radius.max(1.0) {
        return Vec::new();
    }
    let (wu, hu) = (w as usize, h as usize);

    let smooth = if params.blur_sigma > 0.0 {
        gaussian_blur_f32(mask, params.blur_sigma)
    } else {
        mask.clone()
    };
    let gx = horizontal_scharr(&smooth);
    let gy = vertical_scharr(&smooth);

    let mut max_mag = 0.0f64;
    let mut grads = Vec::with_capacity(wu * hu);
    for y in 0..h {
        for x in 0..w {
            let g = (gx.get_pixel(x, y)[0] as f64, gy.get_pixel(x, y)[0] as f64);
            max_mag = max_mag.max(g.0.hypot(g.1));
            grads.push(g);
        }
    }
    if max_mag < 1e-6 {
        return Vec::new();
    }
    let edge_thr = params.grad_threshold * max_mag;

    let mut accum = vec![0.0f32; wu * hu];
    let mut edges = Vec::new();
    let r_lo = min_radius.max(1.0);
    for (idx, &(gxv, gyv)) in grads.iter().enumerate() {
        let mag = gxv.hypot(gyv);
        if mag < edge_thr {
            continue;
        }
        let (x, y) = ((idx % wu) as f64, (idx / wu) as f64);
        edges.push(Point2::new(x, y));
        let (dx, dy) = (gxv / mag, gyv / mag);
        let mut r = r_lo;
        while r <= max_radius {
            let vx = x + dx * r;
            let vy = y + dy * r;
            if vx >= 0.0 && vy >= 0.0 && vx < (w - 1) as f64 && vy < (h - 1) as f64 {
                bilinear_add(&mut accum, wu, vx, vy, mag as f32);
            }
            r += 1.0;
        }
    }

    let Some(accum_img) = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(w, h, accum) else {
        return Vec::new();
    };
    let votes = gaussian_blur_f32(&accum_img, 1.5);
    let data = votes.as_raw();
    let peak = data.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return Vec::new();
    }
    let vote_thr = params.min_vote_frac as f32 * peak;

    let mut peaks: Vec<(usize, f32)> = data
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v >= vote_thr)
        .map(|(i, &v)| (i, v))
        .collect();
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1));

    // Greedy suppression: a peak survives if no stronger survivor is within
    // the minimum centre distance.
    let min_d2 = params.min_distance_px * params.min_distance_px;
    let mut centers: Vec<Point2<f64>> = Vec::new();
    for (idx, _) in peaks {
        let c = Point2::new((idx % wu) as f64, (idx / wu) as f64);
        if centers.iter().all(|k| (k - c).norm_squared() >= min_d2) {
            centers.push(c);
        }
    }

    centers
        .into_iter()
        .filter_map(|c| best_radius(c, &edges, r_lo, max_radius, params.min_support))
        .collect()
}

fn best_radius(
    center: Point2<f64>,
    edges: &[Point2<f64>],
    min_radius: f64,
    max_radius: f64,
    min_support: f64,
) -> Option<HoughCircle> {
    let bins = max_radius.ceil() as usize + 2;
    let mut hist = vec![0u32; bins];
    for e in edges {
        let d = (e - center).norm().round() as usize;
        if d < bins {
            hist[d] += 1;
        }
    }

    let mut best: Option<(usize, f64)> = None;
    let lo = min_radius.ceil() as usize;
    let hi = (max_radius.floor() as usize).min(bins - 2);
    for r in lo.max(1)..=hi {
        // Smoothed gradients spread an edge over a few pixels: pool the shell
        // and its neighbours, and credit at most one edge sample per pixel of
        // circumference.
        let count = (hist[r - 1] + hist[r] + hist[r + 1]) as f64;
        let density = count / 3.0 / (2.0 * PI * r as f64);
        if density < min_support {
            continue;
        }
        if best.is_none_or(|(_, d)| density > d) {
            best = Some((r, density));
        }
    }
    best.map(|(r, density)| HoughCircle {
        center,
        radius: r as f64,
        support: density.min(1.0),
    })
}
