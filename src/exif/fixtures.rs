//! Hand-built EXIF payloads for tests.
//!
//! [`camera_tiff`] lays out a big-endian TIFF the way cameras do: IFD0 with
//! `Make` and pointers to an Exif sub-IFD (which itself points at an Interop
//! IFD) and to a GPS IFD at 40°26'46"N 79°56'55"W.

const BYTE: u16 = 1;
const ASCII: u16 = 2;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;
const UNDEFINED: u16 = 7;

struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    data: Vec<u8>,
}

fn ascii(tag: u16, s: &str) -> Entry {
    let mut data = s.as_bytes().to_vec();
    data.push(0);
    Entry { tag, kind: ASCII, count: data.len() as u32, data }
}

fn long(tag: u16, v: u32) -> Entry {
    Entry { tag, kind: LONG, count: 1, data: v.to_be_bytes().to_vec() }
}

fn raw(tag: u16, kind: u16, bytes: &[u8]) -> Entry {
    Entry { tag, kind, count: bytes.len() as u32, data: bytes.to_vec() }
}

fn rationals(tag: u16, values: &[(u32, u32)]) -> Entry {
    let data = values
        .iter()
        .flat_map(|(n, d)| n.to_be_bytes().into_iter().chain(d.to_be_bytes()))
        .collect();
    Entry { tag, kind: RATIONAL, count: values.len() as u32, data }
}

/// Size of an IFD including its out-of-line values.
fn ifd_len(entries: &[Entry]) -> u32 {
    let extra: usize = entries
        .iter()
        .filter(|e| e.data.len() > 4)
        .map(|e| e.data.len() + e.data.len() % 2)
        .sum();
    (2 + 12 * entries.len() + 4 + extra) as u32
}

/// Append an IFD at the current end of `out`, values following the entries.
fn write_ifd(out: &mut Vec<u8>, entries: &[Entry]) {
    let start = out.len();
    let mut extra = Vec::new();
    let extra_at = start + 2 + 12 * entries.len() + 4;

    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for e in entries {
        out.extend_from_slice(&e.tag.to_be_bytes());
        out.extend_from_slice(&e.kind.to_be_bytes());
        out.extend_from_slice(&e.count.to_be_bytes());
        if e.data.len() <= 4 {
            let mut inline = e.data.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&((extra_at + extra.len()) as u32).to_be_bytes());
            extra.extend_from_slice(&e.data);
            if extra.len() % 2 == 1 {
                extra.push(0);
            }
        }
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&extra);
}

pub(crate) fn camera_tiff() -> Vec<u8> {
    let ifd0 = |exif_at, gps_at| {
        vec![ascii(0x010F, "Canon"), long(0x8769, exif_at), long(0x8825, gps_at)]
    };
    let exif = |interop_at| {
        vec![long(0xA002, 4032), long(0xA003, 3024), long(0xA005, interop_at)]
    };
    let interop = vec![ascii(0x0001, "R98"), raw(0x0002, UNDEFINED, b"0100")];
    let gps = vec![
        raw(0x0000, BYTE, &[2, 3, 0, 0]),
        ascii(0x0001, "N"),
        rationals(0x0002, &[(40, 1), (26, 1), (46, 1)]),
        ascii(0x0003, "W"),
        rationals(0x0004, &[(79, 1), (56, 1), (55, 1)]),
    ];

    let exif_at = 8 + ifd_len(&ifd0(0, 0));
    let interop_at = exif_at + ifd_len(&exif(0));
    let gps_at = interop_at + ifd_len(&interop);

    let mut tiff = b"MM\0\x2A".to_vec();
    tiff.extend_from_slice(&8u32.to_be_bytes());
    write_ifd(&mut tiff, &ifd0(exif_at, gps_at));
    write_ifd(&mut tiff, &exif(interop_at));
    write_ifd(&mut tiff, &interop);
    write_ifd(&mut tiff, &gps);
    tiff
}

/// A small real JPEG with `tiff` spliced in as an `Exif\0\0` APP1 segment.
pub(crate) fn jpeg_with_exif(tiff: &[u8]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([40, 120, 200]));
    let mut encoded = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Jpeg)
        .unwrap();

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);

    let mut jpeg = encoded[..2].to_vec();
    jpeg.extend_from_slice(&[0xFF, 0xE1]);
    jpeg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(&payload);
    jpeg.extend_from_slice(&encoded[2..]);
    jpeg
}
