/// Failures of coordinate conversion.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("latitude {0} outside the UTM range [-80, 84]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180)")]
    LongitudeOutOfRange(f64),

    #[error("easting {0} outside [100000, 1000000)")]
    EastingOutOfRange(f64),

    #[error("northing {0} outside [0, 10000000]")]
    NorthingOutOfRange(f64),

    #[error("invalid UTM zone {number}{letter}")]
    InvalidZone { number: u8, letter: char },
}
