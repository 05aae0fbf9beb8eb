use image::{Rgb, RgbImage};
use nalgebra::Point2;
use puttrack::aruco::builtins::{builtin_dictionary, DICT_4X4_50};
use puttrack::aruco::{Dictionary, MarkerDetectParams};
use puttrack::{CalibrationError, MarkerConfig, PuttrackConfig, Session};

const CODES: [u64; 4] = [0x1e2d, 0x8b53, 0xc6a1, 0x3779];

fn paint_marker(img: &mut RgbImage, code: u64, x0: u32, y0: u32, cell: u32) {
    let bits = 4u32;
    let cells = bits + 2;
    for cy in 0..cells {
        for cx in 0..cells {
            let border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            let idx = (cy.saturating_sub(1) * bits + cx.saturating_sub(1)) as usize;
            let black = border || (code >> idx) & 1 == 1;
            let v = if black { 0u8 } else { 255u8 };
            for yy in 0..cell {
                for xx in 0..cell {
                    img.put_pixel(x0 + cx * cell + xx, y0 + cy * cell + yy, Rgb([v, v, v]));
                }
            }
        }
    }
}

fn marker_config() -> PuttrackConfig {
    PuttrackConfig {
        markers: MarkerConfig {
            dictionary: Some(Dictionary::new("test_4x4", 4, CODES.to_vec()).expect("dict")),
            params: MarkerDetectParams::default(),
            required_ids: [0, 1, 2, 3],
        },
        ..PuttrackConfig::default()
    }
}

/// Markers centred near (70, 70), (570, 70), (570, 410), (70, 410).
fn frame_with_codes(codes: &[u64], ids: &[usize]) -> RgbImage {
    let mut img = RgbImage::from_pixel(640, 480, Rgb([255, 255, 255]));
    let origins = [(40, 40), (540, 40), (540, 380), (40, 380)];
    for &id in ids {
        let (x, y) = origins[id];
        paint_marker(&mut img, codes[id], x, y, 10);
    }
    img
}

fn marker_frame(ids: &[usize]) -> RgbImage {
    frame_with_codes(&CODES, ids)
}

#[test]
fn calibrates_from_corner_markers() {
    let mut session = Session::new(marker_config()).expect("session");
    session
        .calibrate_from_frame(&marker_frame(&[0, 1, 2, 3]))
        .expect("calibrate");

    let pos = session.positioner();
    assert!(pos.is_calibrated());
    let mapping = pos.mapping().expect("mapping");
    assert!(mapping.reprojection_error < 1e-6);

    // 500 px span for 60 plane units along x, 340 px for 40 along y.
    let centre = pos.image_to_plane(Point2::new(320.0, 240.0)).expect("plane");
    assert!((centre - Point2::new(30.0, 20.0)).norm() < 0.2, "{centre:?}");
    let corner = pos.image_to_plane(Point2::new(570.0, 410.0)).expect("plane");
    assert!((corner - Point2::new(60.0, 40.0)).norm() < 0.2, "{corner:?}");
}

#[test]
fn missing_marker_keeps_previous_calibration() {
    let mut session = Session::new(marker_config()).expect("session");
    session
        .calibrate_from_frame(&marker_frame(&[0, 1, 2, 3]))
        .expect("calibrate");
    let before = *session.positioner().mapping().expect("mapping");

    let err = session
        .calibrate_from_frame(&marker_frame(&[0, 1, 3]))
        .expect_err("three markers");
    assert_eq!(err, CalibrationError::InsufficientCorrespondences { got: 3 });
    assert_eq!(session.positioner().mapping(), Some(&before));
    assert_eq!(session.calibrator().mapping(), Some(&before));
}

#[test]
fn default_config_calibrates_from_dict_4x4_50_markers() {
    let dict = builtin_dictionary(DICT_4X4_50).expect("builtin");
    let mut session = Session::new(PuttrackConfig::default()).expect("session");
    session
        .calibrate_from_frame(&frame_with_codes(&dict.codes, &[0, 1, 2, 3]))
        .expect("calibrate");

    let pos = session.positioner();
    let centre = pos.image_to_plane(Point2::new(320.0, 240.0)).expect("plane");
    assert!((centre - Point2::new(30.0, 20.0)).norm() < 0.2, "{centre:?}");
    let origin = pos.image_to_plane(Point2::new(70.0, 70.0)).expect("plane");
    assert!(origin.coords.norm() < 0.2, "{origin:?}");
}

#[test]
fn marker_calibration_needs_a_dictionary() {
    let mut config = PuttrackConfig::default();
    config.markers.dictionary = None;
    let mut session = Session::new(config).expect("session");
    assert_eq!(
        session.calibrate_from_frame(&marker_frame(&[0, 1, 2, 3])),
        Err(CalibrationError::MarkersUnavailable)
    );
    assert!(!session.positioner().is_calibrated());
}
