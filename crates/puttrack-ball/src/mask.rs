use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

use crate::params::MorphologyParams;

/// Remove speckle and close small gaps: one erosion, then repeated dilation.
pub fn clean_mask(mask: &GrayImage, params: &MorphologyParams) -> GrayImage {
    let mut out = if params.erode_radius > 0 {
        erode(mask, Norm::LInf, params.erode_radius)
    } else {
        mask.clone()
    };
    if params.dilate_radius > 0 {
        for _ in 0..params.dilate_iterations {
            out = dilate(&out, Norm::LInf, params.dilate_radius);
        }
    }
    out
}
