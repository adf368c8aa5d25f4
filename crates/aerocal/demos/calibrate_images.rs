//! Calibrate a camera from checkerboard photos and write the model as JSON.
//!
//! Usage: calibrate_images <camera.json> <image>...

use std::env;

use aerocal::calib::CalibrationRun;
use aerocal::detect::calibrate_image_files;
use aerocal::CalibrationParams;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((output, inputs)) = args.split_first() else {
        eprintln!("Usage: calibrate_images <camera.json> <image>...");
        return Ok(());
    };

    let images = match CalibrationRun::classify(inputs)? {
        CalibrationRun::Images(images) => images,
        CalibrationRun::Videos(videos) => {
            eprintln!("{} videos given; extract frames to images first", videos.len());
            return Ok(());
        }
    };

    let model = calibrate_image_files(&images, CalibrationParams::default())?;
    println!(
        "{} views, rms {:.3} px, fov {:.2}° x {:.2}°",
        model.n_images, model.rms_reprojection_error, model.fov_x_deg, model.fov_y_deg
    );
    model.write_json(output)?;
    println!("wrote camera model to {output}");
    Ok(())
}
