//! Location accuracy derived from the photo's EXIF GPS position.

use tracing::warn;

use super::super::domain::{DeliveryContext, DmsCoordinate, ExifRecord, GpsInfo};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Scores how close the photo was taken to the expected drop-off point.
///
/// Photos without a GPS sub-mapping cannot be verified and score `0.0`.
/// The score falls off linearly and reaches zero at `max_distance_meters`.
pub fn score(exif: &ExifRecord, context: &DeliveryContext, max_distance_meters: f64) -> f64 {
    let Some(gps) = exif.gps.as_ref() else {
        return 0.0;
    };

    let Some((latitude, longitude)) = gps_coordinates(gps) else {
        warn!(
            object = context.object_name(),
            "GPS metadata present but incomplete; location cannot be verified"
        );
        return 0.0;
    };

    let distance = haversine_distance_meters(
        latitude,
        longitude,
        context.expected_latitude(),
        context.expected_longitude(),
    );
    score_distance(distance, max_distance_meters)
}

/// Linear falloff of a distance against the configured cap.
pub fn score_distance(distance_meters: f64, max_distance_meters: f64) -> f64 {
    if !(max_distance_meters > 0.0) || !distance_meters.is_finite() {
        return 0.0;
    }
    (1.0 - distance_meters.min(max_distance_meters) / max_distance_meters).max(0.0)
}

/// Signed decimal latitude and longitude, or `None` when either is unusable.
pub fn gps_coordinates(gps: &GpsInfo) -> Option<(f64, f64)> {
    let mut latitude = dms_to_decimal(gps.latitude.as_ref()?)?;
    let mut longitude = dms_to_decimal(gps.longitude.as_ref()?)?;

    if hemisphere_is(gps.latitude_ref.as_deref(), 'S') {
        latitude = -latitude;
    }
    if hemisphere_is(gps.longitude_ref.as_deref(), 'W') {
        longitude = -longitude;
    }

    Some((latitude, longitude))
}

fn hemisphere_is(reference: Option<&str>, expected: char) -> bool {
    reference
        .and_then(|value| value.trim().chars().next())
        .map(|first| first.eq_ignore_ascii_case(&expected))
        .unwrap_or(false)
}

pub fn dms_to_decimal(dms: &DmsCoordinate) -> Option<f64> {
    let [degrees, minutes, seconds] = dms.0;
    Some(degrees.to_f64()? + minutes.to_f64()? / 60.0 + seconds.to_f64()? / 3600.0)
}

/// Great-circle distance in meters between two WGS84 points.
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat1 - lat2).to_radians();
    let d_lon = (lon1 - lon2).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat2.to_radians().cos() * lat1.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_METERS * c
}
