use aerocal_calib::{
    field_of_view_deg, CalibrationParams, CameraCalibrator, CameraModel, Distortion, Intrinsics,
    PlanarView, Pose,
};
use aerocal_checkerboard::DetectorParams;
use aerocal_core::GrayImage;
use approx::assert_abs_diff_eq;
use nalgebra::{Point3, Vector3};

fn truth() -> (Intrinsics, Distortion) {
    (
        Intrinsics {
            fx: 1150.0,
            fy: 1140.0,
            cx: 965.0,
            cy: 535.0,
        },
        Distortion {
            k1: -0.12,
            k2: 0.05,
            ..Distortion::default()
        },
    )
}

fn view_from_pose(k: &Intrinsics, d: &Distortion, rotation: [f64; 3], translation: [f64; 3]) -> PlanarView {
    let pose = Pose {
        rotation: Vector3::from(rotation),
        translation: Vector3::from(translation),
    };
    let r = pose.matrix();
    let object_points: Vec<Point3<f64>> = (0..10)
        .flat_map(|c| (0..7).map(move |r| Point3::new(c as f64, r as f64, 0.0)))
        .collect();
    let image_points = object_points
        .iter()
        .map(|p| {
            k.project(d, &Point3::from(r * p.coords + pose.translation))
                .expect("board in front of camera")
        })
        .collect();
    PlanarView {
        object_points,
        image_points,
    }
}

fn synthetic_views() -> Vec<PlanarView> {
    let (k, d) = truth();
    [
        ([0.35, 0.2, 0.05], [-4.5, -3.0, 13.0]),
        ([-0.3, 0.3, -0.1], [-5.0, -3.5, 12.0]),
        ([0.15, -0.35, 0.15], [-4.0, -2.5, 11.0]),
        ([0.25, 0.15, 0.9], [-2.0, -6.0, 14.0]),
        ([-0.2, -0.25, -0.3], [-5.5, -2.0, 12.5]),
    ]
    .into_iter()
    .map(|(r, t)| view_from_pose(&k, &d, r, t))
    .collect()
}

#[test]
fn calibrates_synthetic_views_and_persists_model() {
    let calibrator = CameraCalibrator::default();
    let model = calibrator
        .calibrate_views(&synthetic_views(), (1920, 1080))
        .expect("calibration");

    let (k, d) = truth();
    let est = model.intrinsics();
    assert_abs_diff_eq!(est.fx, k.fx, epsilon = 0.5);
    assert_abs_diff_eq!(est.fy, k.fy, epsilon = 0.5);
    assert_abs_diff_eq!(est.cx, k.cx, epsilon = 0.5);
    assert_abs_diff_eq!(est.cy, k.cy, epsilon = 0.5);
    assert_abs_diff_eq!(model.distortion.k1, d.k1, epsilon = 1e-3);
    assert!(model.rms_reprojection_error < 1e-3);
    assert_eq!(model.n_images, 5);
    assert_eq!(model.image_size, (1920, 1080));

    let (fov_x, fov_y) = field_of_view_deg(&model.camera_matrix, model.image_size);
    assert_abs_diff_eq!(model.fov_x_deg, fov_x, epsilon = 1e-12);
    assert_abs_diff_eq!(model.fov_y_deg, fov_y, epsilon = 1e-12);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("drone_camera.json");
    model.write_json(&path).expect("write");
    let loaded = CameraModel::load_json(&path).expect("load");
    assert_abs_diff_eq!(loaded.camera_matrix, model.camera_matrix, epsilon = 1e-9);
    assert_eq!(loaded.n_images, model.n_images);
}

fn render_board(size: usize, margin: usize, cell: usize, squares: usize) -> GrayImage {
    let mut img = GrayImage::new(size, size);
    for y in 0..size {
        for x in 0..size {
            let inside = x >= margin && y >= margin && x < margin + cell * squares && y < margin + cell * squares;
            let dark = inside && ((x - margin) / cell + (y - margin) / cell) % 2 == 0;
            img.data[y * size + x] = if dark { 30 } else { 220 };
        }
    }
    img
}

#[test]
fn rendered_board_yields_planar_view() {
    let params = CalibrationParams {
        detector: DetectorParams {
            kernel_size: 21,
            scale_factor: 10.0,
            neighbourhood_size: 64,
            ..DetectorParams::default()
        },
        ..CalibrationParams::default()
    };
    let calibrator = CameraCalibrator::new(params);
    let img = render_board(200, 40, 24, 5);

    let view = calibrator.examine(&img.view()).expect("board accepted");
    assert_eq!(view.len(), 16);
    for (obj, px) in view.object_points.iter().zip(&view.image_points) {
        assert_eq!(obj.z, 0.0);
        assert!(obj.x.fract() == 0.0 && obj.y.fract() == 0.0);
        let (u, v) = ((px.x - 40.0) / 24.0, (px.y - 40.0) / 24.0);
        assert!((u - u.round()).abs() * 24.0 < 1.5 && (v - v.round()).abs() * 24.0 < 1.5);
    }
}

#[test]
fn coverage_gate_rejects_small_boards() {
    let params = CalibrationParams {
        detector: DetectorParams {
            kernel_size: 21,
            scale_factor: 10.0,
            neighbourhood_size: 64,
            ..DetectorParams::default()
        },
        min_coverage: 0.5,
        ..CalibrationParams::default()
    };
    let calibrator = CameraCalibrator::new(params);
    let img = render_board(200, 40, 24, 5);
    assert!(calibrator.examine(&img.view()).is_none());
}
