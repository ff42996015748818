//! IPTC-IIM reading for JPEG and TIFF files.
//!
//! - JPEG: APP13 segment with a `Photoshop 3.0\0` header, 8BIM resource 0x0404
//! - TIFF: IFD tag 33723 (IPTC-NAA, raw IIM) or 34377 (Photoshop resources)
//!
//! Only the application record (2) is reported. Each IIM dataset is
//! `0x1C, record, dataset, u16 BE length, data`.

use img_parts::jpeg::Jpeg;
use img_parts::Bytes;
use std::fmt;

use crate::error::{MetaError, Result};

const IPTC_HEADER: &[u8] = b"Photoshop 3.0\0";
const IPTC_8BIM: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const APP13: u8 = 0xED;

const TIFF_TAG_IPTC_NAA: u16 = 33723;
const TIFF_TAG_PHOTOSHOP: u16 = 34377;
const MAX_IFDS: usize = 64;

const IIM_MARKER: u8 = 0x1C;
const APPLICATION_RECORD: u8 = 2;

/// Record 2 dataset names.
const DATASETS: &[(u8, &str)] = &[
    (0, "RecordVersion"),
    (3, "ObjectTypeReference"),
    (4, "ObjectAttributeReference"),
    (5, "ObjectName"),
    (7, "EditStatus"),
    (10, "Urgency"),
    (12, "SubjectReference"),
    (15, "Category"),
    (20, "SupplementalCategories"),
    (22, "FixtureIdentifier"),
    (25, "Keywords"),
    (26, "ContentLocationCode"),
    (27, "ContentLocationName"),
    (30, "ReleaseDate"),
    (35, "ReleaseTime"),
    (37, "ExpirationDate"),
    (38, "ExpirationTime"),
    (40, "SpecialInstructions"),
    (42, "ActionAdvised"),
    (45, "ReferenceService"),
    (47, "ReferenceDate"),
    (50, "ReferenceNumber"),
    (55, "DateCreated"),
    (60, "TimeCreated"),
    (62, "DigitalCreationDate"),
    (63, "DigitalCreationTime"),
    (65, "OriginatingProgram"),
    (70, "ProgramVersion"),
    (75, "ObjectCycle"),
    (80, "By-line"),
    (85, "By-lineTitle"),
    (90, "City"),
    (92, "Sub-location"),
    (95, "Province-State"),
    (100, "Country-PrimaryLocationCode"),
    (101, "Country-PrimaryLocationName"),
    (103, "OriginalTransmissionReference"),
    (105, "Headline"),
    (110, "Credit"),
    (115, "Source"),
    (116, "CopyrightNotice"),
    (118, "Contact"),
    (120, "Caption-Abstract"),
    (122, "Writer-Editor"),
    (130, "ImageType"),
    (131, "ImageOrientation"),
    (135, "LanguageIdentifier"),
];

/// Datasets that may occur more than once.
const REPEATABLE: &[u8] = &[4, 12, 20, 25, 26, 27, 42, 45, 47, 50, 80, 85, 118, 122];

/// Name of a record 2 dataset, or `2:<n>` when unknown.
pub fn dataset_name(dataset: u8) -> String {
    DATASETS
        .iter()
        .find(|(id, _)| *id == dataset)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("{APPLICATION_RECORD}:{dataset}"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum IptcValue {
    Single(String),
    List(Vec<String>),
}

impl fmt::Display for IptcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IptcValue::Single(s) => f.write_str(s),
            IptcValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Read the IPTC application record of a JPEG or TIFF file.
///
/// `Ok(None)` means the container has no IPTC block (other formats always
/// yield `None`).
pub fn read_iptc(bytes: &[u8]) -> Result<Option<Vec<(String, IptcValue)>>> {
    let block = if bytes.starts_with(&[0xFF, 0xD8]) {
        find_in_jpeg(bytes)?
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        find_in_tiff(bytes)?
    } else {
        None
    };

    match block {
        Some(iim) => parse_iim(&iim).map(Some),
        None => Ok(None),
    }
}

fn find_in_jpeg(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| MetaError::IptcParse(format!("invalid JPEG structure: {e}")))?;

    for segment in jpeg.segments() {
        if segment.marker() != APP13 {
            continue;
        }
        let contents = segment.contents();
        let Some(resources) = contents.strip_prefix(IPTC_HEADER) else {
            continue;
        };
        if let Some(iim) = find_resource(resources)? {
            return Ok(Some(iim.to_vec()));
        }
    }
    Ok(None)
}

/// Find resource 0x0404 in a sequence of Photoshop 8BIM blocks.
///
/// Each block: `8BIM`, u16 id, even-padded Pascal name, u32 length, even-padded data.
fn find_resource(data: &[u8]) -> Result<Option<&[u8]>> {
    let truncated = || MetaError::IptcParse("truncated 8BIM resource".into());
    let mut pos = 0;

    while pos + 4 <= data.len() {
        if &data[pos..pos + 4] != IPTC_8BIM {
            break;
        }
        pos += 4;

        let id = data
            .get(pos..pos + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(truncated)?;
        pos += 2;

        let name_len = *data.get(pos).ok_or_else(truncated)? as usize;
        pos += 1 + name_len + (1 + name_len) % 2;

        let len = data
            .get(pos..pos + 4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .ok_or_else(truncated)?;
        pos += 4;

        let body = pos
            .checked_add(len)
            .and_then(|end| data.get(pos..end))
            .ok_or_else(truncated)?;
        if id == IPTC_RESOURCE_ID {
            return Ok(Some(body));
        }
        pos += len + len % 2;
    }
    Ok(None)
}

/// Bounds-checked TIFF reader.
struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> Tiff<'a> {
    fn u16_at(&self, off: usize) -> Option<u16> {
        let b = self.data.get(off..off + 2)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, off: usize) -> Option<u32> {
        let b = self.data.get(off..off + 4)?;
        Some(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    /// Bytes of an IFD entry's value, inline or at its offset.
    fn value(&self, entry: usize) -> Option<&'a [u8]> {
        let typ = self.u16_at(entry + 2)?;
        let count = self.u32_at(entry + 4)? as usize;
        let len = count.checked_mul(type_size(typ))?;
        let start = if len <= 4 {
            entry + 8
        } else {
            self.u32_at(entry + 8)? as usize
        };
        self.data.get(start..start.checked_add(len)?)
    }
}

fn type_size(typ: u16) -> usize {
    match typ {
        3 | 8 => 2,
        4 | 9 | 11 => 4,
        5 | 10 | 12 => 8,
        _ => 1,
    }
}

fn find_in_tiff(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let tiff = Tiff {
        data: bytes,
        big_endian: bytes.starts_with(b"MM"),
    };
    let Some(mut ifd) = tiff.u32_at(4).map(|o| o as usize) else {
        return Ok(None);
    };

    let mut photoshop = None;
    let mut visited = Vec::new();
    while ifd != 0 && !visited.contains(&ifd) && visited.len() < MAX_IFDS {
        visited.push(ifd);
        let Some(count) = tiff.u16_at(ifd) else {
            break;
        };

        for i in 0..count as usize {
            let entry = ifd + 2 + i * 12;
            let Some(tag) = tiff.u16_at(entry) else {
                return Err(MetaError::IptcParse("truncated TIFF directory".into()));
            };
            match tag {
                TIFF_TAG_IPTC_NAA => {
                    let value = tiff.value(entry).ok_or_else(|| {
                        MetaError::IptcParse("IPTC-NAA tag points past end of file".into())
                    })?;
                    return Ok(Some(value.to_vec()));
                }
                TIFF_TAG_PHOTOSHOP if photoshop.is_none() => photoshop = tiff.value(entry),
                _ => {}
            }
        }

        match tiff.u32_at(ifd + 2 + count as usize * 12) {
            Some(next) => ifd = next as usize,
            None => break,
        }
    }

    match photoshop {
        Some(resources) => Ok(find_resource(resources)?.map(<[u8]>::to_vec)),
        None => Ok(None),
    }
}

/// Parse IIM datasets, keeping record 2 in file order.
fn parse_iim(data: &[u8]) -> Result<Vec<(String, IptcValue)>> {
    let mut fields: Vec<(String, IptcValue)> = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if data[pos] != IIM_MARKER {
            // trailing padding
            pos += 1;
            continue;
        }
        let header = data
            .get(pos..pos + 5)
            .ok_or_else(|| MetaError::IptcParse("truncated dataset header".into()))?;
        let (record, dataset) = (header[1], header[2]);
        let raw_len = u16::from_be_bytes([header[3], header[4]]) as usize;
        pos += 5;

        let len = if raw_len & 0x8000 != 0 {
            // extended dataset: low bits give the size of the length field
            let size = raw_len & 0x7FFF;
            let field = data
                .get(pos..pos + size)
                .filter(|f| f.len() <= 8)
                .ok_or_else(|| MetaError::IptcParse("bad extended dataset length".into()))?;
            pos += size;
            field.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
        } else {
            raw_len
        };

        let body = pos
            .checked_add(len)
            .and_then(|end| data.get(pos..end))
            .ok_or_else(|| {
                MetaError::IptcParse(format!("dataset {record}:{dataset} truncated"))
            })?;
        pos += len;

        if record != APPLICATION_RECORD {
            continue;
        }
        let value = decode_value(dataset, body);
        push_value(&mut fields, dataset, value);
    }

    Ok(fields)
}

fn decode_value(dataset: u8, body: &[u8]) -> String {
    match (dataset, body) {
        // RecordVersion is a binary u16
        (0, [hi, lo]) => u16::from_be_bytes([*hi, *lo]).to_string(),
        _ => String::from_utf8_lossy(body)
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string(),
    }
}

fn push_value(fields: &mut Vec<(String, IptcValue)>, dataset: u8, value: String) {
    let name = dataset_name(dataset);
    let existing = fields.iter_mut().find(|(n, _)| *n == name);

    match (existing, REPEATABLE.contains(&dataset)) {
        (Some((_, IptcValue::List(items))), true) => items.push(value),
        (Some((_, slot)), false) => *slot = IptcValue::Single(value),
        (None, true) => fields.push((name, IptcValue::List(vec![value]))),
        (None, false) => fields.push((name, IptcValue::Single(value))),
        // a repeatable name can only ever hold a list
        (Some((_, slot)), true) => *slot = IptcValue::List(vec![value]),
    }
}
