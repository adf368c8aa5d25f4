//! Drone flight logs and their alignment with recorded video.
//!
//! A [`DroneLog`] holds the gimbal attitude, height and GPS position over
//! time. [`FlightAlignment`] locates a video inside the log, by geotag or by
//! duration, and then answers "where was the drone at frame N".
//!
//! ```no_run
//! use aerocal_telemetry::{DroneLog, FlightAlignment, VideoMetadata};
//!
//! let log = DroneLog::parse(&std::fs::read("flight.csv")?)?;
//! let video = VideoMetadata::new(62.5, 1875, 3840, 2160);
//! let mut alignment = FlightAlignment::new(log, video);
//! let outcome = alignment.match_log_and_video()?;
//! if let Some(w) = outcome.warning {
//!     eprintln!("{w}");
//! }
//! let pose = alignment.pose_at_frame(900)?;
//! println!("{} m at {:?}", pose.height_m, pose.position);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod alignment;
mod error;
mod flight_log;
mod segments;
mod video;

pub use alignment::{
    AlignmentOutcome, AlignmentWarning, FlightAlignment, FramePose, StartTime, DURATION_TOLERANCE_S,
    POSITION_TOLERANCE_M,
};
pub use error::TelemetryError;
pub use flight_log::{decode_log_bytes, detect_format, DroneLog, LogFormat, LogSeries, PoseSample};
pub use segments::{video_segments, VideoSegment};
pub use video::{parse_location_tag, VideoMetadata};
