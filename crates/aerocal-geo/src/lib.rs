//! Georeferencing for drone video frames.
//!
//! A [`Projector`] turns a pixel into the ground point it shows, given the
//! drone's height above ground, its gimbal attitude and its GPS position.
//! Ground is assumed flat. Positions are exchanged in UTM meters
//! ([`WorldPoint`]) or WGS84 degrees ([`GeoPosition`]).
//!
//! ```
//! use aerocal_geo::{GeoPosition, Projector, YawPitchRoll};
//! use nalgebra::Point2;
//!
//! let projector = Projector::new((1920, 1080), 1.0, 0.6);
//! let ypr = YawPitchRoll::from_degrees(0.0, -60.0, 0.0);
//! let ground = projector
//!     .world_point(Point2::new(960.0, 540.0), 30.0, &ypr, &GeoPosition::new(55.0, 10.0))
//!     .unwrap();
//! assert_eq!(ground.zone.number, 32);
//! ```

mod error;
mod horizon;
mod projector;
pub mod utm;

pub use error::GeoError;
pub use horizon::{
    default_direction_sets, Direction, DirectionSet, HorizonOverlay, OverlayLine, OverlayOffset,
    OverlayPoint, DIRECTION_SAMPLES, OVERLAY_MARGIN,
};
pub use projector::{pitch_matrix, roll_matrix, rotation, yaw_matrix, Projector, YawPitchRoll};
pub use utm::{from_latlon, to_latlon, GeoPosition, UtmZone, WorldPoint};
