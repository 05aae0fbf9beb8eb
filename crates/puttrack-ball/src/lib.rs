//! Ball localization in video frames.
//!
//! [`BallDetector`] finds a coloured ball in a single frame by HSV
//! segmentation and contour shape scoring, with a gradient-voting circle
//! search as fallback. Trackers implementing [`Tracker`] follow it from
//! frame to frame, and [`Localizer`] switches between the two, re-detecting
//! on the same frame when a track is lost.

mod color;
mod detect;
mod hough;
mod localizer;
mod mask;
mod params;
mod roi;
mod shape;
mod track;

pub use color::{hsv_mask, rgb_to_hsv, Hsv, HsvRange};
pub use detect::{detection_score, BallDetector, LocalizationResult};
pub use hough::{find_circles, HoughCircle};
pub use localizer::{LocalizeOutcome, LocalizeStatus, Localizer};
pub use mask::clean_mask;
pub use params::{
    DetectorParams, HoughParams, LocalizerParams, MorphologyParams, ParamsError, TrackerParams,
    TrackingMethod,
};
pub use roi::Roi;
pub use shape::{blob_shapes, min_enclosing_circle, polygon_area, BlobShape};
pub use track::{build_tracker, ColorTracker, TemplateTracker, TrackState, TrackUpdate, Tracker};
