use serde::Serialize;

use super::tags::{GPS_LATITUDE, GPS_LATITUDE_REF, GPS_LONGITUDE, GPS_LONGITUDE_REF};
use super::value::TagValue;
use crate::error::{MetaError, Result};

/// A signed decimal-degree position derived from the GPS block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting values outside the valid ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(MetaError::InvalidCoordinate(format!(
                "latitude {latitude} out of range"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(MetaError::InvalidCoordinate(format!(
                "longitude {longitude} out of range"
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// Google Maps search URL for this position.
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            self.latitude, self.longitude
        )
    }
}

/// Convert a degrees/minutes/seconds triple to signed decimal degrees.
///
/// Each component is a plain number or a rational pair. The result is
/// negated when `reference` is `S` or `W`; any other reference leaves the
/// sign unchanged.
pub fn dms_to_decimal(dms: &[TagValue], reference: &str) -> Result<f64> {
    if dms.len() < 3 {
        return Err(MetaError::InvalidCoordinate(format!(
            "expected 3 components, got {}",
            dms.len()
        )));
    }

    let degrees = component(&dms[0], "degrees")?;
    let minutes = component(&dms[1], "minutes")?;
    let seconds = component(&dms[2], "seconds")?;

    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;

    match reference.trim_matches(|c: char| c == '\0' || c.is_whitespace()) {
        "S" | "s" | "W" | "w" => Ok(-decimal),
        _ => Ok(decimal),
    }
}

fn component(value: &TagValue, what: &str) -> Result<f64> {
    match value {
        TagValue::Rational(_, 0) => Err(MetaError::InvalidCoordinate(format!(
            "{what} has a zero denominator"
        ))),
        other => other.as_f64().ok_or_else(|| {
            MetaError::InvalidCoordinate(format!("{what} is not numeric: {other}"))
        }),
    }
}

/// Derive the decimal position from a GPS block.
///
/// Returns `None` without complaint when either triple or reference is
/// missing or a triple is shorter than 3 elements. Malformed or out-of-range
/// values are logged and also yield `None`.
pub fn derive_coordinate(gps: &[(u16, TagValue)]) -> Option<Coordinate> {
    let get = |id: u16| gps.iter().find(|(tag, _)| *tag == id).map(|(_, v)| v);

    let lat = get(GPS_LATITUDE)?.components();
    let lat_ref = get(GPS_LATITUDE_REF)?.to_string();
    let lon = get(GPS_LONGITUDE)?.components();
    let lon_ref = get(GPS_LONGITUDE_REF)?.to_string();

    if lat.len() < 3 || lon.len() < 3 {
        log::debug!("GPS triples incomplete, skipping coordinate");
        return None;
    }

    let parsed = dms_to_decimal(lat, &lat_ref)
        .and_then(|latitude| Ok((latitude, dms_to_decimal(lon, &lon_ref)?)))
        .and_then(|(latitude, longitude)| Coordinate::new(latitude, longitude));

    match parsed {
        Ok(coord) => Some(coord),
        Err(e) => {
            log::warn!("Ignoring GPS position: {e}");
            None
        }
    }
}
