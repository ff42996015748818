use nom_exif::*;
use std::io::Cursor;

use super::tags::{
    GPS_LATITUDE, GPS_LATITUDE_REF, GPS_LONGITUDE, GPS_LONGITUDE_REF, GPS_TAG_MAX,
    INTEROP_INDEX, INTEROP_VERSION, TAG_GPS_INFO,
};
use super::value::TagValue;

/// Raw EXIF tags of the primary image, before name resolution.
///
/// `entries` keeps the order the IFDs were walked in. `gps` holds the GPS
/// sub-directory, when the file has one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExif {
    pub entries: Vec<(u16, TagValue)>,
    pub gps: Option<Vec<(u16, TagValue)>>,
}

impl RawExif {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.gps.as_ref().is_none_or(|g| g.is_empty())
    }

    /// First top-level value for a tag id.
    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.entries.iter().find(|(t, _)| *t == tag).map(|(_, v)| v)
    }

    /// Pixel dimensions recorded in the Exif sub-IFD (or the baseline
    /// ImageWidth/ImageLength pair as a fallback).
    pub fn pixel_dimensions(&self) -> Option<(u32, u32)> {
        let dim = |tag: u16| {
            self.get(tag)
                .and_then(TagValue::as_f64)
                .filter(|v| *v > 0.0 && *v <= u32::MAX as f64)
                .map(|v| v as u32)
        };
        dim(0xA002)
            .zip(dim(0xA003))
            .or_else(|| dim(0x0100).zip(dim(0x0101)))
    }
}

/// Decode the EXIF block of an in-memory image.
///
/// Returns `None` when the container carries no EXIF or nom-exif does not
/// recognise it; neither case is an error for the report.
pub fn read_exif(bytes: &[u8]) -> Option<RawExif> {
    let ms = match MediaSource::seekable(Cursor::new(bytes)) {
        Ok(ms) => ms,
        Err(e) => {
            log::debug!("EXIF container not recognised: {e}");
            return None;
        }
    };
    if !ms.has_exif() {
        log::debug!("Container has no EXIF support");
        return None;
    }

    let mut parser = MediaParser::new();
    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(e) => {
            log::debug!("No EXIF data found: {e}");
            return None;
        }
    };

    // Read from the GPSInfo sub-IFD directly, before the iterator is consumed
    let gps_info = match iter.parse_gps_info() {
        Ok(info) => info,
        Err(e) => {
            log::debug!("GPS sub-IFD not parsed: {e}");
            None
        }
    };

    let mut raw = RawExif::default();
    for entry in iter {
        // IFD1 describes the embedded thumbnail
        if entry.ifd_index() != 0 {
            continue;
        }
        let code = entry.tag_code();
        let Some(value) = entry.get_value() else {
            log::debug!("Skipping undecodable EXIF tag 0x{code:04X}");
            continue;
        };
        let value = convert(value);

        if is_gps_entry(code, &value) {
            raw.gps.get_or_insert_with(Vec::new).push((code, value));
        } else {
            raw.entries.push((code, value));
        }
    }

    if let Some(info) = gps_info {
        apply_gps_info(raw.gps.get_or_insert_with(Vec::new), &info);
    }

    if raw.is_empty() {
        return None;
    }
    if raw.gps.is_some() && raw.get(TAG_GPS_INFO).is_none() {
        log::debug!("GPS block found without a GPSInfo pointer entry");
    }
    Some(raw)
}

/// Whether a walked entry belongs to the GPS block.
///
/// nom-exif reports sub-IFD entries under IFD0 without saying which
/// sub-IFD they came from. Only the Interop IFD shares ids with the GPS
/// IFD: GPSLatitudeRef is a single hemisphere letter where
/// InteroperabilityIndex is a code like `R98`, and GPSLatitude is a
/// rational triple where InteroperabilityVersion is four undefined bytes.
fn is_gps_entry(code: u16, value: &TagValue) -> bool {
    match code {
        INTEROP_INDEX => value
            .as_text()
            .is_some_and(|s| s.trim().chars().count() == 1),
        INTEROP_VERSION => matches!(value, TagValue::List(_) | TagValue::Rational(..)),
        code => code <= GPS_TAG_MAX,
    }
}

/// Replace the coordinate tags of the GPS block with the values nom-exif
/// read from the GPS sub-IFD, dropping duplicates.
fn apply_gps_info(gps: &mut Vec<(u16, TagValue)>, info: &GPSInfo) {
    let triple = |l: &LatLng| {
        TagValue::List(
            [&l.0, &l.1, &l.2]
                .into_iter()
                .map(|r| TagValue::Rational(r.0 as i64, r.1 as i64))
                .collect(),
        )
    };
    let coordinate_tags = [
        (GPS_LATITUDE_REF, TagValue::Text(info.latitude_ref.to_string())),
        (GPS_LATITUDE, triple(&info.latitude)),
        (GPS_LONGITUDE_REF, TagValue::Text(info.longitude_ref.to_string())),
        (GPS_LONGITUDE, triple(&info.longitude)),
    ];

    for (tag, value) in coordinate_tags {
        let mut first = true;
        gps.retain(|(t, _)| *t != tag || std::mem::take(&mut first));
        match gps.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => {
                let at = gps.iter().position(|(t, _)| *t > tag).unwrap_or(gps.len());
                gps.insert(at, (tag, value));
            }
        }
    }
}

/// Map a nom-exif value onto the library-independent [`TagValue`].
fn convert(value: &EntryValue) -> TagValue {
    match value {
        EntryValue::Text(s) => TagValue::Text(s.clone()),
        EntryValue::URational(r) => TagValue::Rational(r.0 as i64, r.1 as i64),
        EntryValue::IRational(r) => TagValue::Rational(r.0 as i64, r.1 as i64),
        EntryValue::U8(v) => TagValue::Integer(*v as i64),
        EntryValue::U16(v) => TagValue::Integer(*v as i64),
        EntryValue::U32(v) => TagValue::Integer(*v as i64),
        EntryValue::I16(v) => TagValue::Integer(*v as i64),
        EntryValue::I32(v) => TagValue::Integer(*v as i64),
        EntryValue::Undefined(bytes) => TagValue::Bytes(bytes.clone()),
        EntryValue::URationalArray(items) => TagValue::List(
            items
                .iter()
                .map(|r| TagValue::Rational(r.0 as i64, r.1 as i64))
                .collect(),
        ),
        EntryValue::IRationalArray(items) => TagValue::List(
            items
                .iter()
                .map(|r| TagValue::Rational(r.0 as i64, r.1 as i64))
                .collect(),
        ),
        EntryValue::U8Array(items) => {
            TagValue::List(items.iter().map(|v| TagValue::Integer(*v as i64)).collect())
        }
        EntryValue::U16Array(items) => {
            TagValue::List(items.iter().map(|v| TagValue::Integer(*v as i64)).collect())
        }
        EntryValue::U32Array(items) => {
            TagValue::List(items.iter().map(|v| TagValue::Integer(*v as i64)).collect())
        }
        other => TagValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::derive_coordinate;
    use crate::exif::fixtures::{camera_tiff, jpeg_with_exif};

    fn rational_triple(d: i64, m: i64, s: i64) -> TagValue {
        TagValue::List(vec![
            TagValue::Rational(d, 1),
            TagValue::Rational(m, 1),
            TagValue::Rational(s, 1),
        ])
    }

    #[test]
    fn reads_camera_jpeg() {
        let raw = read_exif(&jpeg_with_exif(&camera_tiff())).unwrap();

        assert_eq!(raw.get(0x010F), Some(&TagValue::Text("Canon".into())));
        assert_eq!(raw.pixel_dimensions(), Some((4032, 3024)));

        let gps = raw.gps.as_deref().unwrap();
        assert!(gps.iter().all(|(tag, _)| *tag <= GPS_TAG_MAX));
        assert!(!gps.iter().any(|(_, v)| v.to_string().contains("R98")));
        assert_eq!(
            gps.iter().filter(|(tag, _)| *tag == GPS_LATITUDE).count(),
            1
        );

        let coord = derive_coordinate(gps).unwrap();
        assert!((coord.latitude - 40.446111).abs() < 1e-6);
        assert!((coord.longitude + 79.948611).abs() < 1e-6);
    }

    #[test]
    fn interop_ids_stay_out_of_the_gps_block() {
        let walked = [
            (INTEROP_INDEX, TagValue::Text("R98".into())),
            (INTEROP_VERSION, TagValue::Bytes(b"0100".to_vec())),
            (GPS_LATITUDE_REF, TagValue::Text("N".into())),
            (GPS_LATITUDE, rational_triple(40, 26, 46)),
            (GPS_LONGITUDE_REF, TagValue::Text("W".into())),
            (GPS_LONGITUDE, rational_triple(79, 56, 55)),
        ];
        let (gps, other): (Vec<_>, Vec<_>) = walked
            .into_iter()
            .partition(|(code, value)| is_gps_entry(*code, value));

        assert_eq!(
            other.iter().map(|(code, _)| *code).collect::<Vec<_>>(),
            [INTEROP_INDEX, INTEROP_VERSION]
        );
        assert_eq!(gps.len(), 4);
        assert!(derive_coordinate(&gps).is_some());
    }

    #[test]
    fn high_ids_are_never_gps() {
        assert!(!is_gps_entry(0x010F, &TagValue::Text("N".into())));
        assert!(!is_gps_entry(0x1001, &TagValue::Integer(3)));
        assert!(is_gps_entry(0x0000, &TagValue::List(vec![TagValue::Integer(2)])));
        assert!(is_gps_entry(0x0006, &TagValue::Rational(120, 1)));
    }

    #[test]
    fn garbage_bytes_have_no_exif() {
        assert_eq!(read_exif(b"definitely not an image"), None);
        assert_eq!(read_exif(&[]), None);
    }

    #[test]
    fn pixel_dimensions_prefer_exif_sub_ifd() {
        let raw = RawExif {
            entries: vec![
                (0x0100, TagValue::Integer(160)),
                (0x0101, TagValue::Integer(120)),
                (0xA002, TagValue::Integer(4032)),
                (0xA003, TagValue::Integer(3024)),
            ],
            gps: None,
        };
        assert_eq!(raw.pixel_dimensions(), Some((4032, 3024)));

        let raw = RawExif {
            entries: vec![(0x0100, TagValue::Integer(160)), (0x0101, TagValue::Integer(120))],
            gps: None,
        };
        assert_eq!(raw.pixel_dimensions(), Some((160, 120)));
        assert_eq!(RawExif::default().pixel_dimensions(), None);
    }

    #[test]
    fn emptiness() {
        assert!(RawExif::default().is_empty());
        let raw = RawExif {
            entries: Vec::new(),
            gps: Some(vec![(1, TagValue::Text("N".into()))]),
        };
        assert!(!raw.is_empty());
    }
}
