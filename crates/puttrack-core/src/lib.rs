//! Geometric core for planar ball positioning.
//!
//! Homographies and their solvers, a generic RANSAC engine, a borrowed gray
//! image view with bilinear sampling, and the stderr logger. Nothing in here
//! knows about balls, markers or games.

mod geometry;
mod homography;
mod image;
mod logger;
pub mod ransac;

pub use geometry::{centroid, cross2, extent, has_collinear_triple, COLLINEAR_REL_EPS};
pub use homography::{
    estimate_homography, homography_from_4pt, mean_transfer_error, Homography, HOMOGENEOUS_EPS,
};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use ransac::{ransac, Estimator, HomographyEstimator, PointPair, RansacOptions, RansacResult};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_LEVEL_ENV};
