//! Project frame annotations onto the ground and print them as CSV.
//!
//! Usage: georeference <session.json> <flight-log.csv> <video-data.csv> <annotations.json> [start-time]

use std::{env, fs, io, path::Path};

use aerocal::annotations::{parse_annotations, project_annotation, write_annotations_csv};
use aerocal::io::PipelineConfig;
use aerocal::telemetry::{DroneLog, FlightAlignment, VideoMetadata};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let [cfg_path, log_path, video_path, annotations_path, rest @ ..] = args.as_slice() else {
        eprintln!(
            "Usage: georeference <session.json> <flight-log.csv> <video-data.csv> <annotations.json> [start-time]"
        );
        return Ok(());
    };

    let cfg = PipelineConfig::load_json(cfg_path)?;
    let camera = cfg
        .load_camera_model()?
        .ok_or("session config has no camera_model_path")?;

    let log = DroneLog::parse(&fs::read(log_path)?)?;
    let video = VideoMetadata::from_data_file(fs::File::open(video_path)?)?;
    let projector = cfg.build_projector(&camera, (video.width, video.height));

    let mut alignment = FlightAlignment::new(log, video);
    alignment.set_takeoff_altitude(cfg.takeoff_altitude_m);
    let outcome = match rest.first() {
        Some(start) => alignment.apply_start_time(start)?,
        None => alignment.match_log_and_video()?,
    };
    if let Some(warning) = outcome.warning {
        eprintln!("{warning}");
    }

    let annotations = parse_annotations(&fs::read_to_string(annotations_path)?)?;
    let records = annotations
        .iter()
        .map(|a| project_annotation(&alignment, &projector, a))
        .collect::<Result<Vec<_>, _>>()?;

    let video_name = Path::new(video_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    write_annotations_csv(
        io::stdout().lock(),
        &records,
        &video_name,
        cfg.project.as_deref().unwrap_or(""),
        env!("CARGO_PKG_VERSION"),
    )?;
    Ok(())
}

fn init_logging() {
    #[cfg(feature = "tracing")]
    aerocal::init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
