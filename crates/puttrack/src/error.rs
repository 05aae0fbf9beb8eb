use puttrack_aruco::DictionaryError;
use puttrack_ball::ParamsError;
use puttrack_game::GameParamsError;

/// Why a calibration attempt was rejected. The previous mapping stays active.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("need 4 finite point correspondences, got {got}")]
    InsufficientCorrespondences { got: usize },
    #[error("degenerate correspondences: {0}")]
    Degenerate(&'static str),
    #[error("homography has non-finite entries")]
    NonFinite,
    #[error("reprojection error {error:.3}px exceeds {max:.3}px")]
    ReprojectionTooLarge { error: f64, max: f64 },
    #[error("no marker dictionary configured")]
    MarkersUnavailable,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositioningError {
    #[error("plane mapping is not calibrated")]
    NotCalibrated,
    #[error("point maps to infinity under the plane mapping")]
    ProjectionDegenerate,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid localizer parameters: {0}")]
    Localizer(#[from] ParamsError),
    #[error("invalid game parameters: {0}")]
    Game(#[from] GameParamsError),
    #[error("invalid marker dictionary: {0}")]
    Dictionary(#[from] DictionaryError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error of the facade.
#[derive(thiserror::Error, Debug)]
pub enum PuttrackError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Positioning(#[from] PositioningError),
}
