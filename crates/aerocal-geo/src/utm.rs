//! WGS84 ⇄ UTM with the truncated transverse Mercator series.
//!
//! Zones follow the standard 6° grid plus the Norway (32V) and Svalbard
//! (31X/33X/35X/37X) exceptions. Latitude bands run `C..X` over
//! `[-80°, 84°]`, band X being 12° tall.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

const K0: f64 = 0.9996;
const E: f64 = 0.00669438;
const E2: f64 = E * E;
const E3: f64 = E2 * E;
const E_P2: f64 = E / (1.0 - E);

const M1: f64 = 1.0 - E / 4.0 - 3.0 * E2 / 64.0 - 5.0 * E3 / 256.0;
const M2: f64 = 3.0 * E / 8.0 + 3.0 * E2 / 32.0 + 45.0 * E3 / 1024.0;
const M3: f64 = 15.0 * E2 / 256.0 + 45.0 * E3 / 1024.0;
const M4: f64 = 35.0 * E3 / 3072.0;

const R: f64 = 6_378_137.0;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

const ZONE_LETTERS: &[u8; 21] = b"CDEFGHJKLMNPQRSTUVWXX";

/// UTM zone number `1..=60` and latitude band letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtmZone {
    pub number: u8,
    pub letter: char,
}

impl UtmZone {
    /// The zone containing a WGS84 position, exceptions included.
    ///
    /// Callers must check the latitude range first.
    fn containing(lat: f64, lon: f64) -> Self {
        let number = if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
            32
        } else if (72.0..=84.0).contains(&lat) && lon >= 0.0 && lon < 42.0 {
            match lon {
                l if l < 9.0 => 31,
                l if l < 21.0 => 33,
                l if l < 33.0 => 35,
                _ => 37,
            }
        } else {
            (((lon + 180.0) / 6.0) as u32 % 60 + 1) as u8
        };
        let band = ((lat + 80.0) as usize) >> 3;
        Self {
            number,
            letter: ZONE_LETTERS[band.min(ZONE_LETTERS.len() - 1)] as char,
        }
    }

    pub fn is_northern(&self) -> bool {
        self.letter.to_ascii_uppercase() >= 'N'
    }

    fn central_longitude_deg(&self) -> f64 {
        (self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    fn validate(&self) -> Result<(), GeoError> {
        let letter = self.letter.to_ascii_uppercase();
        let valid_letter = letter.is_ascii() && ZONE_LETTERS.contains(&(letter as u8));
        if !(1..=60).contains(&self.number) || !valid_letter {
            return Err(GeoError::InvalidZone {
                number: self.number,
                letter: self.letter,
            });
        }
        Ok(())
    }
}

/// A ground position in UTM meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub easting: f64,
    pub northing: f64,
    pub zone: UtmZone,
}

/// WGS84 latitude and longitude in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Wrap an angle into `[-π, π)`.
fn mod_angle(v: f64) -> f64 {
    (v + PI).rem_euclid(2.0 * PI) - PI
}

pub fn from_latlon(lat: f64, lon: f64) -> Result<WorldPoint, GeoError> {
    if !(-80.0..=84.0).contains(&lat) {
        return Err(GeoError::LatitudeOutOfRange(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(GeoError::LongitudeOutOfRange(lon));
    }
    let zone = UtmZone::containing(lat, lon);

    let lat_rad = lat.to_radians();
    let (lat_sin, lat_cos) = lat_rad.sin_cos();
    let lat_tan = lat_sin / lat_cos;
    let lat_tan2 = lat_tan * lat_tan;
    let lat_tan4 = lat_tan2 * lat_tan2;

    let n = R / (1.0 - E * lat_sin * lat_sin).sqrt();
    let c = E_P2 * lat_cos * lat_cos;

    let a = lat_cos * mod_angle(lon.to_radians() - zone.central_longitude_deg().to_radians());
    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let m = R
        * (M1 * lat_rad - M2 * (2.0 * lat_rad).sin() + M3 * (4.0 * lat_rad).sin()
            - M4 * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + a3 / 6.0 * (1.0 - lat_tan2 + c)
            + a5 / 120.0 * (5.0 - 18.0 * lat_tan2 + lat_tan4 + 72.0 * c - 58.0 * E_P2))
        + FALSE_EASTING;
    let mut northing = K0
        * (m + n
            * lat_tan
            * (a2 / 2.0
                + a4 / 24.0 * (5.0 - lat_tan2 + 9.0 * c + 4.0 * c * c)
                + a6 / 720.0 * (61.0 - 58.0 * lat_tan2 + lat_tan4 + 600.0 * c - 330.0 * E_P2)));
    if lat < 0.0 {
        northing += FALSE_NORTHING_SOUTH;
    }

    Ok(WorldPoint {
        easting,
        northing,
        zone,
    })
}

pub fn to_latlon(easting: f64, northing: f64, zone: UtmZone) -> Result<GeoPosition, GeoError> {
    if !(100_000.0..1_000_000.0).contains(&easting) {
        return Err(GeoError::EastingOutOfRange(easting));
    }
    if !(0.0..=10_000_000.0).contains(&northing) {
        return Err(GeoError::NorthingOutOfRange(northing));
    }
    zone.validate()?;

    let sqrt_e = (1.0 - E).sqrt();
    let e1 = (1.0 - sqrt_e) / (1.0 + sqrt_e);
    let (e1_2, e1_3) = (e1 * e1, e1 * e1 * e1);
    let (e1_4, e1_5) = (e1_3 * e1, e1_3 * e1_2);
    let p2 = 3.0 / 2.0 * e1 - 27.0 / 32.0 * e1_3 + 269.0 / 512.0 * e1_5;
    let p3 = 21.0 / 16.0 * e1_2 - 55.0 / 32.0 * e1_4;
    let p4 = 151.0 / 96.0 * e1_3 - 417.0 / 128.0 * e1_5;
    let p5 = 1097.0 / 512.0 * e1_4;

    let x = easting - FALSE_EASTING;
    let y = if zone.is_northern() {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let mu = y / K0 / (R * M1);
    let p_rad = mu
        + p2 * (2.0 * mu).sin()
        + p3 * (4.0 * mu).sin()
        + p4 * (6.0 * mu).sin()
        + p5 * (8.0 * mu).sin();

    let (p_sin, p_cos) = p_rad.sin_cos();
    let p_tan = p_sin / p_cos;
    let p_tan2 = p_tan * p_tan;
    let p_tan4 = p_tan2 * p_tan2;

    let ep_sin = 1.0 - E * p_sin * p_sin;
    let n = R / ep_sin.sqrt();
    let r = (1.0 - E) / ep_sin;
    let c = E_P2 * p_cos * p_cos;
    let c2 = c * c;

    let d = x / (n * K0);
    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat = p_rad
        - (p_tan / r) * (d2 / 2.0 - d4 / 24.0 * (5.0 + 3.0 * p_tan2 + 10.0 * c - 4.0 * c2 - 9.0 * E_P2))
        + d6 / 720.0 * (61.0 + 90.0 * p_tan2 + 298.0 * c + 45.0 * p_tan4 - 252.0 * E_P2 - 3.0 * c2);
    let lon = (d - d3 / 6.0 * (1.0 + 2.0 * p_tan2 + c)
        + d5 / 120.0 * (5.0 - 2.0 * c + 28.0 * p_tan2 - 3.0 * c2 + 8.0 * E_P2 + 24.0 * p_tan4))
        / p_cos;
    let lon = mod_angle(lon + zone.central_longitude_deg().to_radians());

    Ok(GeoPosition {
        lat: lat.to_degrees(),
        lon: lon.to_degrees(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn zone(number: u8, letter: char) -> UtmZone {
        UtmZone { number, letter }
    }

    #[test]
    fn converts_reference_position() {
        let wp = from_latlon(55.0, 10.0).unwrap();
        assert_abs_diff_eq!(wp.easting, 563967.4231030797, epsilon = 1e-6);
        assert_abs_diff_eq!(wp.northing, 6095248.70878471, epsilon = 1e-6);
        assert_eq!(wp.zone, zone(32, 'U'));
    }

    #[test]
    fn zone_exceptions_and_bands() {
        assert_eq!(from_latlon(60.0, 5.0).unwrap().zone, zone(32, 'V'));
        assert_eq!(from_latlon(78.0, 10.0).unwrap().zone, zone(33, 'X'));
        assert_eq!(from_latlon(84.0, 0.0).unwrap().zone, zone(31, 'X'));
        assert_eq!(from_latlon(0.0, 0.0).unwrap().zone, zone(31, 'N'));

        let south = from_latlon(-33.9, 18.4).unwrap();
        assert_eq!(south.zone, zone(34, 'H'));
        assert_abs_diff_eq!(south.easting, 259583.22164196818, epsilon = 1e-6);
        assert_abs_diff_eq!(south.northing, 6245888.04541583, epsilon = 1e-6);
    }

    #[test]
    fn round_trip_keeps_zone_and_position() {
        for (lat, lon) in [(55.0, 10.0), (60.0, 5.0), (-33.9, 18.4), (78.0, 10.0), (0.0, 0.0)] {
            let wp = from_latlon(lat, lon).unwrap();
            let back = to_latlon(wp.easting, wp.northing, wp.zone).unwrap();
            assert_abs_diff_eq!(back.lat, lat, epsilon = 1e-5);
            assert_abs_diff_eq!(back.lon, lon, epsilon = 1e-5);
            assert_eq!(from_latlon(back.lat, back.lon).unwrap().zone, wp.zone);
        }
    }

    #[test]
    fn rejects_out_of_range_input() {
        assert_eq!(from_latlon(84.5, 0.0), Err(GeoError::LatitudeOutOfRange(84.5)));
        assert_eq!(from_latlon(-80.1, 0.0), Err(GeoError::LatitudeOutOfRange(-80.1)));
        assert_eq!(from_latlon(10.0, 181.0), Err(GeoError::LongitudeOutOfRange(181.0)));
        assert!(from_latlon(f64::NAN, 0.0).is_err());

        assert_eq!(
            to_latlon(50_000.0, 10.0, zone(32, 'U')),
            Err(GeoError::EastingOutOfRange(50_000.0))
        );
        assert_eq!(
            to_latlon(500_000.0, -1.0, zone(32, 'U')),
            Err(GeoError::NorthingOutOfRange(-1.0))
        );
        assert_eq!(
            to_latlon(500_000.0, 10.0, zone(61, 'U')),
            Err(GeoError::InvalidZone {
                number: 61,
                letter: 'U'
            })
        );
        assert!(to_latlon(500_000.0, 10.0, zone(32, 'I')).is_err());
        assert!(to_latlon(500_000.0, 10.0, zone(32, 'u')).is_ok());
    }

    #[test]
    fn wraps_angles() {
        assert_abs_diff_eq!(mod_angle(PI + 0.5), -PI + 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(mod_angle(-0.25), -0.25, epsilon = 1e-12);
    }
}
