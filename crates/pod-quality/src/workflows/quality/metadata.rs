//! EXIF extraction for delivery photos.

use std::io::Cursor;

use exif::{Field, In, Tag, Value as ExifValue};
use serde_json::Value;

use super::domain::{DmsCoordinate, ExifRecord, GpsInfo, Rational};
use crate::workflows::storage::CollaboratorError;

/// Reads primary-image EXIF tags, grouping GPS tags under `GPSInfo`.
///
/// Images that carry no EXIF block yield an empty record.
pub fn extract_exif(bytes: &[u8]) -> Result<ExifRecord, CollaboratorError> {
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(ExifRecord::default()),
        Err(err) => {
            return Err(CollaboratorError::InvalidResponse(format!(
                "unreadable EXIF block: {err}"
            )))
        }
    };

    let mut record = ExifRecord::default();
    let mut gps = GpsInfo::default();
    let mut has_gps = false;

    for field in exif.fields().filter(|field| field.ifd_num == In::PRIMARY) {
        match field.tag {
            Tag::GPSLatitude => {
                has_gps = true;
                gps.latitude = dms(&field.value);
            }
            Tag::GPSLongitude => {
                has_gps = true;
                gps.longitude = dms(&field.value);
            }
            Tag::GPSLatitudeRef => {
                has_gps = true;
                gps.latitude_ref = ascii(&field.value);
            }
            Tag::GPSLongitudeRef => {
                has_gps = true;
                gps.longitude_ref = ascii(&field.value);
            }
            tag if tag.context() == exif::Context::Gps => {
                has_gps = true;
                gps.other.insert(tag.to_string(), tag_value(field));
            }
            tag => {
                record.tags.insert(tag.to_string(), tag_value(field));
            }
        }
    }

    if has_gps {
        record.gps = Some(gps);
    }
    Ok(record)
}

fn dms(value: &ExifValue) -> Option<DmsCoordinate> {
    match value {
        ExifValue::Rational(parts) if parts.len() >= 3 => Some(DmsCoordinate([
            Rational(parts[0].num, parts[0].denom),
            Rational(parts[1].num, parts[1].denom),
            Rational(parts[2].num, parts[2].denom),
        ])),
        _ => None,
    }
}

fn ascii(value: &ExifValue) -> Option<String> {
    match value {
        ExifValue::Ascii(lines) => lines
            .first()
            .map(|line| String::from_utf8_lossy(line).trim().to_string()),
        _ => None,
    }
}

fn tag_value(field: &Field) -> Value {
    match &field.value {
        ExifValue::Short(values) if values.len() == 1 => Value::from(values[0]),
        ExifValue::Long(values) if values.len() == 1 => Value::from(values[0]),
        ExifValue::Ascii(_) => ascii(&field.value).map(Value::String).unwrap_or(Value::Null),
        _ => Value::String(
            field
                .display_value()
                .to_string()
                .trim_matches('"')
                .to_string(),
        ),
    }
}
