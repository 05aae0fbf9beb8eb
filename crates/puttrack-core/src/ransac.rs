//! Robust model fitting by random sample consensus.
//!
//! Implement [`Estimator`] for a model and call [`ransac`]. A failed search
//! is not an error: the returned [`RansacResult`] simply carries no model.
//! [`HomographyEstimator`] is the estimator used for plane calibration.

use nalgebra::Point2;
use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::geometry::has_collinear_triple;
use crate::homography::{estimate_homography, homography_from_4pt, Homography};

/// Knobs for the consensus search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    pub max_iters: usize,
    /// Inlier residual threshold, in the estimator's residual units.
    pub thresh: f64,
    pub min_inliers: usize,
    /// Target probability of drawing at least one all-inlier sample.
    pub confidence: f64,
    pub seed: u64,
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 500,
            thresh: 5.0,
            min_inliers: 4,
            confidence: 0.995,
            seed: 0x5eed_ba11,
            refit_on_inliers: true,
        }
    }
}

/// Outcome of [`ransac`]. `model` is `None` when no consensus was reached.
#[derive(Clone, Debug)]
pub struct RansacResult<M> {
    pub model: Option<M>,
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over `inliers`.
    pub inlier_rms: f64,
    pub iters: usize,
}

impl<M> RansacResult<M> {
    fn empty() -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.model.is_some()
    }
}

/// A model that can be fitted from minimal samples and scored per datum.
pub trait Estimator {
    type Datum;
    type Model;

    const MIN_SAMPLES: usize;

    /// Fit from exactly `MIN_SAMPLES` indices; `None` when the fit fails.
    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Non-negative error of one datum under `model`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    fn is_degenerate(_data: &[Self::Datum], _sample: &[usize]) -> bool {
        false
    }

    /// Least-squares fit over a consensus set. `None` keeps the minimal model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    let ss: f64 = vals.iter().map(|v| v * v).sum();
    (ss / vals.len() as f64).sqrt()
}

/// Adaptive iteration bound `log(1-p) / log(1-w^m)`, never below the
/// iterations already spent.
fn required_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    done: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n = ((1.0 - confidence.min(1.0 - 1e-12)).ln() / denom).ceil() as usize;
    n.clamp(done, max_iters)
}

fn score<E: Estimator>(
    model: &E::Model,
    data: &[E::Datum],
    thresh: f64,
    inliers: &mut Vec<usize>,
    residuals: &mut Vec<f64>,
) {
    inliers.clear();
    residuals.clear();
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
}

/// Run the consensus loop for estimator `E`.
///
/// More inliers wins; ties go to the lower inlier RMS.
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best = RansacResult::empty();
    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut budget = opts.max_iters;

    let mut inliers = Vec::with_capacity(data.len());
    let mut residuals = Vec::with_capacity(data.len());

    let mut iter = 0;
    while iter < budget {
        iter += 1;
        for (slot, &idx) in sample
            .iter_mut()
            .zip(all.as_slice().choose_multiple(&mut rng, E::MIN_SAMPLES))
        {
            *slot = idx;
        }

        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(mut model) = E::fit(data, &sample) else {
            continue;
        };

        score::<E>(&model, data, opts.thresh, &mut inliers, &mut residuals);
        if inliers.len() < opts.min_inliers.max(E::MIN_SAMPLES) {
            continue;
        }

        if opts.refit_on_inliers {
            if let Some(refined) = E::refit(data, &inliers) {
                let mut r_inliers = Vec::with_capacity(data.len());
                let mut r_residuals = Vec::with_capacity(data.len());
                score::<E>(&refined, data, opts.thresh, &mut r_inliers, &mut r_residuals);
                // Keep the refit only if it does not lose support.
                if r_inliers.len() >= inliers.len() {
                    model = refined;
                    inliers = r_inliers;
                    residuals = r_residuals;
                }
            }
        }

        let current_rms = rms(&residuals);
        let better = best.model.is_none()
            || inliers.len() > best.inliers.len()
            || (inliers.len() == best.inliers.len() && current_rms < best.inlier_rms);
        if better {
            best.model = Some(model);
            best.inliers = inliers.clone();
            best.inlier_rms = current_rms;
            best.iters = iter;
        }

        let ratio = best.inliers.len() as f64 / data.len() as f64;
        budget = required_iterations(opts.confidence, ratio, E::MIN_SAMPLES, iter, opts.max_iters);
    }

    best
}

/// A source/destination correspondence, with `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointPair {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
}

/// Homography estimator with residual measured in destination units.
pub struct HomographyEstimator;

impl Estimator for HomographyEstimator {
    type Datum = PointPair;
    type Model = Homography;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[PointPair], sample: &[usize]) -> Option<Homography> {
        let src: [Point2<f64>; 4] = std::array::from_fn(|k| data[sample[k]].src);
        let dst: [Point2<f64>; 4] = std::array::from_fn(|k| data[sample[k]].dst);
        homography_from_4pt(&src, &dst).filter(Homography::is_finite)
    }

    fn residual(model: &Homography, datum: &PointPair) -> f64 {
        match model.try_apply(datum.src) {
            Some(p) => (p - datum.dst).norm(),
            None => f64::INFINITY,
        }
    }

    fn is_degenerate(data: &[PointPair], sample: &[usize]) -> bool {
        let src: Vec<Point2<f64>> = sample.iter().map(|&i| data[i].src).collect();
        let dst: Vec<Point2<f64>> = sample.iter().map(|&i| data[i].dst).collect();
        has_collinear_triple(&src) || has_collinear_triple(&dst)
    }

    fn refit(data: &[PointPair], inliers: &[usize]) -> Option<Homography> {
        let src: Vec<Point2<f64>> = inliers.iter().map(|&i| data[i].src).collect();
        let dst: Vec<Point2<f64>> = inliers.iter().map(|&i| data[i].dst).collect();
        estimate_homography(&src, &dst).filter(Homography::is_finite)
    }
}
