//! Frame annotations projected onto the ground, and their CSV export.
//!
//! Annotations are drawn on a video frame in pixel coordinates. A line
//! stores its endpoints relative to the center of its bounding box, a point
//! stores its pixel position directly.

use std::io::Write;

use aerocal_geo::{to_latlon, GeoPosition, Projector, WorldPoint};
use aerocal_telemetry::FlightAlignment;
use chrono::NaiveDateTime;
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::AerocalError;

/// Column header of the annotation CSV export.
pub const CSV_HEADER: [&str; 24] = [
    "name",
    "time",
    "frame",
    "height",
    "yaw",
    "pitch",
    "roll",
    "length",
    "lat",
    "lon",
    "east",
    "north",
    "zone number",
    "zone letter",
    "image_x",
    "image_y",
    "start_east",
    "start_north",
    "end_east",
    "end_north",
    "heading",
    "video",
    "project",
    "pro. version",
];

const NOT_AVAILABLE: &str = "NA";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnnotationPrimitive {
    FrameLine {
        name: String,
        frame: usize,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    FramePoint {
        name: String,
        frame: usize,
        left: f64,
        top: f64,
    },
}

impl AnnotationPrimitive {
    pub fn name(&self) -> &str {
        match self {
            AnnotationPrimitive::FrameLine { name, .. } | AnnotationPrimitive::FramePoint { name, .. } => name,
        }
    }

    pub fn frame(&self) -> usize {
        match self {
            AnnotationPrimitive::FrameLine { frame, .. } | AnnotationPrimitive::FramePoint { frame, .. } => *frame,
        }
    }

    /// Line endpoints in frame pixels; `None` for points.
    pub fn line_endpoints(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        match self.geometry() {
            Geometry::Line(a, b) => Some((a, b)),
            Geometry::Point(_) => None,
        }
    }

    fn geometry(&self) -> Geometry {
        match *self {
            AnnotationPrimitive::FrameLine {
                left,
                top,
                width,
                height,
                x1,
                y1,
                x2,
                y2,
                ..
            } => {
                let (cx, cy) = (left + width / 2.0, top + height / 2.0);
                Geometry::Line(Point2::new(x1 + cx, y1 + cy), Point2::new(x2 + cx, y2 + cy))
            }
            AnnotationPrimitive::FramePoint { left, top, .. } => Geometry::Point(Point2::new(left, top)),
        }
    }
}

enum Geometry {
    Line(Point2<f64>, Point2<f64>),
    Point(Point2<f64>),
}

/// Parse a JSON array of annotations, skipping entries of unknown type.
pub fn parse_annotations(json: &str) -> Result<Vec<AnnotationPrimitive>, AerocalError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    Ok(values
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(a) => Some(a),
            Err(err) => {
                debug!("annotation skipped: {err}");
                None
            }
        })
        .collect())
}

/// One exported annotation. Angles in degrees, distances in meters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub name: String,
    pub timestamp: NaiveDateTime,
    pub frame: usize,
    pub height_m: f64,
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    /// Ground length of a line.
    pub length_m: Option<f64>,
    pub position: GeoPosition,
    pub world: WorldPoint,
    pub image_x: f64,
    pub image_y: f64,
    pub start: Option<WorldPoint>,
    pub end: Option<WorldPoint>,
    /// Compass bearing from start to end, clockwise from north.
    pub heading_deg: Option<f64>,
}

/// Project an annotation through the drone pose at its frame.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(alignment, projector, annotation), fields(frame = annotation.frame()))
)]
pub fn project_annotation(
    alignment: &FlightAlignment,
    projector: &Projector,
    annotation: &AnnotationPrimitive,
) -> Result<AnnotationRecord, AerocalError> {
    let pose = alignment.pose_at_frame(annotation.frame())?;
    let (height, ypr, pos) = (pose.height_m, pose.attitude, pose.position);

    let (pixel, world, line) = match annotation.geometry() {
        Geometry::Line(a, b) => {
            let start = projector.world_point(a, height, &ypr, &pos)?;
            let end = projector.world_point(b, height, &ypr, &pos)?;
            let mid = WorldPoint {
                easting: (start.easting + end.easting) / 2.0,
                northing: (start.northing + end.northing) / 2.0,
                zone: start.zone,
            };
            let pixel = Point2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            (pixel, mid, Some((start, end)))
        }
        Geometry::Point(pixel) => (pixel, projector.world_point(pixel, height, &ypr, &pos)?, None),
    };
    let position = to_latlon(world.easting, world.northing, world.zone)?;

    let (de, dn) = line.map_or((0.0, 0.0), |(s, e)| (e.easting - s.easting, e.northing - s.northing));
    Ok(AnnotationRecord {
        name: annotation.name().to_string(),
        timestamp: pose.timestamp,
        frame: annotation.frame(),
        height_m: height,
        yaw_deg: ypr.yaw.to_degrees(),
        pitch_deg: ypr.pitch.to_degrees(),
        roll_deg: ypr.roll.to_degrees(),
        length_m: line.map(|_| de.hypot(dn)),
        position,
        world,
        image_x: pixel.x,
        image_y: pixel.y,
        start: line.map(|(s, _)| s),
        end: line.map(|(_, e)| e),
        heading_deg: line.map(|_| de.atan2(dn).to_degrees()),
    })
}

fn opt(v: Option<f64>) -> String {
    v.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Write records as CSV; absent values become `NA`.
pub fn write_annotations_csv<W: Write>(
    writer: W,
    records: &[AnnotationRecord],
    video: &str,
    project: &str,
    version: &str,
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for r in records {
        wtr.write_record([
            r.name.clone(),
            r.timestamp.to_string(),
            r.frame.to_string(),
            r.height_m.to_string(),
            r.yaw_deg.to_string(),
            r.pitch_deg.to_string(),
            r.roll_deg.to_string(),
            opt(r.length_m),
            r.position.lat.to_string(),
            r.position.lon.to_string(),
            r.world.easting.to_string(),
            r.world.northing.to_string(),
            r.world.zone.number.to_string(),
            r.world.zone.letter.to_string(),
            r.image_x.to_string(),
            r.image_y.to_string(),
            opt(r.start.map(|p| p.easting)),
            opt(r.start.map(|p| p.northing)),
            opt(r.end.map(|p| p.easting)),
            opt(r.end.map(|p| p.northing)),
            opt(r.heading_deg),
            video.to_string(),
            project.to_string(),
            version.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerocal_geo::from_latlon;
    use aerocal_telemetry::{DroneLog, PoseSample, VideoMetadata};
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn alignment(yaw_deg: f64) -> FlightAlignment {
        let t = NaiveDate::from_ymd_opt(2023, 9, 2)
            .and_then(|d| d.and_hms_opt(11, 0, 0))
            .unwrap();
        let log = DroneLog::from_samples(vec![PoseSample {
            timestamp: t,
            height_m: 50.0,
            yaw: yaw_deg.to_radians(),
            pitch: (-90f64).to_radians(),
            roll: 0.0,
            lat: 56.1,
            lon: 9.5,
            is_recording: true,
        }]);
        let mut a = FlightAlignment::new(log, VideoMetadata::new(1.0, 30, 1920, 1080));
        a.set_start_time(t);
        a
    }

    fn projector() -> Projector {
        Projector::new((1920, 1080), 1.2, 0.7)
    }

    fn horizontal_line() -> AnnotationPrimitive {
        AnnotationPrimitive::FrameLine {
            name: "fence".into(),
            frame: 3,
            left: 760.0,
            top: 540.0,
            width: 400.0,
            height: 0.0,
            x1: -200.0,
            y1: 0.0,
            x2: 200.0,
            y2: 0.0,
        }
    }

    #[test]
    fn line_endpoints_are_box_centered() {
        let (a, b) = horizontal_line().line_endpoints().unwrap();
        assert_eq!(a, Point2::new(760.0, 540.0));
        assert_eq!(b, Point2::new(1160.0, 540.0));
    }

    #[test]
    fn nadir_line_runs_east() {
        let rec = project_annotation(&alignment(0.0), &projector(), &horizontal_line()).unwrap();
        let expected = 2.0 * 50.0 * (200.0 / 1920.0) * 2.0 * 0.6f64.tan();
        assert_abs_diff_eq!(rec.length_m.unwrap(), expected, epsilon = 1e-9);
        assert_abs_diff_eq!(rec.heading_deg.unwrap(), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rec.position.lat, 56.1, epsilon = 1e-6);
        assert_abs_diff_eq!(rec.position.lon, 9.5, epsilon = 1e-6);
        assert_eq!((rec.image_x, rec.image_y), (960.0, 540.0));
        assert_abs_diff_eq!(rec.pitch_deg, -90.0, epsilon = 1e-9);
        assert_eq!(rec.frame, 3);
    }

    #[test]
    fn point_is_projected_at_its_pixel() {
        let point = AnnotationPrimitive::FramePoint {
            name: "post".into(),
            frame: 0,
            left: 960.0,
            top: 540.0,
        };
        let rec = project_annotation(&alignment(30.0), &projector(), &point).unwrap();
        let drone = from_latlon(56.1, 9.5).unwrap();
        assert_abs_diff_eq!(rec.world.easting, drone.easting, epsilon = 1e-6);
        assert_abs_diff_eq!(rec.world.northing, drone.northing, epsilon = 1e-6);
        assert_eq!(rec.length_m, None);
        assert_eq!(rec.heading_deg, None);
        assert_eq!(rec.start, None);
    }

    #[test]
    fn unknown_annotation_types_are_skipped() {
        let json = r#"[
            {"type": "FramePoint", "name": "a", "frame": 1, "left": 10, "top": 20},
            {"type": "FrameCircle", "name": "b", "frame": 1, "radius": 4},
            {"type": "FrameLine", "name": "c", "frame": 2, "left": 0, "top": 0,
             "width": 10, "height": 10, "x1": -5, "y1": -5, "x2": 5, "y2": 5}
        ]"#;
        let parsed = parse_annotations(json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name(), "a");
        assert_eq!(parsed[1].frame(), 2);
    }

    #[test]
    fn csv_marks_missing_values() {
        let line = project_annotation(&alignment(0.0), &projector(), &horizontal_line()).unwrap();
        let point = project_annotation(
            &alignment(0.0),
            &projector(),
            &AnnotationPrimitive::FramePoint {
                name: "post".into(),
                frame: 0,
                left: 100.0,
                top: 100.0,
            },
        )
        .unwrap();

        let mut out = Vec::new();
        write_annotations_csv(&mut out, &[line, point], "DJI_0001.MP4", "survey", "1.2").unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        let first: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(first.len(), 24);
        assert_eq!(first[0], "fence");
        assert_eq!(first[12], "32");
        assert_eq!(first[13], "V");
        assert_eq!(&first[21..], ["DJI_0001.MP4", "survey", "1.2"]);
        let second: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(second[7], "NA");
        assert_eq!(&second[16..21], ["NA"; 5]);
    }
}
