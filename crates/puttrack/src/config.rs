//! JSON configuration bundle, read once at startup.

use crate::calibration::CalibrationParams;
use crate::error::ConfigError;
use crate::pose::PoseParams;
use puttrack_aruco::builtins::{builtin_dictionary, DICT_4X4_50};
use puttrack_aruco::{Dictionary, MarkerDetectParams};
use puttrack_ball::LocalizerParams;
use puttrack_game::{GameParams, PlayArea};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Physical ball properties.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallSpec {
    /// Radius in plane units; also the height of the ball centre.
    pub radius: f64,
    /// Correct plane positions for the height of the ball centre.
    pub height_correction: bool,
}

impl Default for BallSpec {
    fn default() -> Self {
        Self {
            radius: 2.0,
            height_correction: true,
        }
    }
}

impl BallSpec {
    pub fn known_height(&self) -> Option<f64> {
        self.height_correction.then_some(self.radius)
    }
}

/// Fiducial calibration settings. Defaults to the `DICT_4X4_50` corner
/// markers; a `null` dictionary leaves only point calibration available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub dictionary: Option<Dictionary>,
    pub params: MarkerDetectParams,
    /// Marker ids placed at the TL, TR, BR, BL corners of the play area.
    pub required_ids: [u32; 4],
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            dictionary: builtin_dictionary(DICT_4X4_50),
            params: MarkerDetectParams::default(),
            required_ids: [0, 1, 2, 3],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuttrackConfig {
    pub play_area: PlayArea,
    pub ball: BallSpec,
    pub localizer: LocalizerParams,
    pub calibration: CalibrationParams,
    pub pose: PoseParams,
    pub markers: MarkerConfig,
    pub game: GameParams,
}

impl PuttrackConfig {
    /// Load a JSON config from disk. Missing sections take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let area = self.play_area;
        if !(area.width > 0.0 && area.height > 0.0 && area.width.is_finite() && area.height.is_finite())
        {
            return Err(ConfigError::Invalid(format!(
                "play area must be positive, got {}x{}",
                area.width, area.height
            )));
        }
        if !(self.ball.radius >= 0.0 && self.ball.radius.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "ball radius must be non-negative, got {}",
                self.ball.radius
            )));
        }
        if !(self.calibration.ransac.thresh > 0.0 && self.calibration.ransac.thresh.is_finite()) {
            return Err(ConfigError::Invalid(
                "calibration.ransac.thresh must be positive".to_string(),
            ));
        }
        if let Some(f) = self.pose.focal_length_px {
            if !(f > 0.0 && f.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "pose.focal_length_px must be positive, got {f}"
                )));
            }
        }
        self.localizer.validate()?;
        self.game.validate()?;
        if let Some(dict) = &self.markers.dictionary {
            dict.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let cfg = PuttrackConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.play_area.width, 60.0);
        assert_eq!(cfg.ball.known_height(), Some(2.0));
        assert_eq!(cfg.markers.required_ids, [0, 1, 2, 3]);
        let dict = cfg.markers.dictionary.expect("default dictionary");
        assert_eq!(dict.name, DICT_4X4_50);
    }

    #[test]
    fn null_dictionary_disables_markers() {
        let cfg: PuttrackConfig =
            serde_json::from_str(r#"{ "markers": { "dictionary": null } }"#).expect("parse");
        assert!(cfg.markers.dictionary.is_none());
        assert_eq!(cfg.markers.required_ids, [0, 1, 2, 3]);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let cfg: PuttrackConfig = serde_json::from_str(
            r#"{ "ball": { "height_correction": false }, "game": { "max_strokes": 4 } }"#,
        )
        .expect("parse");
        assert_eq!(cfg.ball.radius, 2.0);
        assert_eq!(cfg.ball.known_height(), None);
        assert_eq!(cfg.game.max_strokes, 4);
        assert_eq!(cfg.game.targets.len(), 5);
    }

    #[test]
    fn json_round_trip_through_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("puttrack.json");
        let mut cfg = PuttrackConfig::default();
        cfg.markers.dictionary =
            Some(Dictionary::new("tiny", 4, vec![0x1e2d, 0x8b53]).expect("dict"));
        cfg.pose.focal_length_px = Some(800.0);
        cfg.write_json(&path).expect("write");

        let loaded = PuttrackConfig::load_json(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn invalid_sections_are_reported() {
        let mut cfg = PuttrackConfig::default();
        cfg.game.targets.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::Game(_))));

        let mut cfg = PuttrackConfig::default();
        cfg.play_area.width = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = PuttrackConfig::default();
        cfg.localizer.detector.min_radius_px = 500.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Localizer(_))));
    }
}
