//! Image loading and the File Information section.
//!
//! Only the header is decoded: enough to prove the file is an image and to
//! learn its dimensions and pixel layout. HEIF containers are recognised
//! from their `ftyp` brand, because the `image` crate cannot decode them.

use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;

use crate::error::{MetaError, Result};
use crate::exif::RawExif;
use crate::report::Item;

const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1",
];

/// Basic properties of a loaded image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// `None` for HEIF files whose EXIF does not record the pixel size.
    pub dimensions: Option<(u32, u32)>,
    pub format: String,
    /// Pixel layout, e.g. `RGB`, `RGBA`, `L`.
    pub mode: String,
}

impl FileInfo {
    /// Report items for the File Information section.
    pub fn items(&self) -> Vec<Item> {
        let dimensions = match self.dimensions {
            Some((w, h)) => format!("{w} x {h} pixels"),
            None => "unknown".to_string(),
        };
        vec![
            Item::field("File Name", self.file_name.as_str()),
            Item::field("File Size", format!("{} bytes", self.size)),
            Item::field("Dimensions", dimensions),
            Item::field("Format", self.format.as_str()),
            Item::field("Mode", self.mode.as_str()),
        ]
    }
}

/// Identify an in-memory image.
///
/// `exif` supplies the pixel size of containers the decoder cannot read.
/// Anything that is neither decodable nor HEIF is [`MetaError::Decode`].
pub fn probe(file_name: &str, bytes: &[u8], exif: Option<&RawExif>) -> Result<FileInfo> {
    if is_heif(bytes) {
        log::debug!("{file_name}: HEIF container, dimensions from EXIF");
        return Ok(FileInfo {
            file_name: file_name.to_string(),
            size: bytes.len() as u64,
            dimensions: exif.and_then(RawExif::pixel_dimensions),
            format: "HEIF".to_string(),
            mode: "unknown".to_string(),
        });
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| MetaError::Decode("unrecognized image format".into()))?;
    let decoder = reader.into_decoder()?;

    Ok(FileInfo {
        file_name: file_name.to_string(),
        size: bytes.len() as u64,
        dimensions: Some(decoder.dimensions()),
        format: format_name(format),
        mode: mode_name(decoder.color_type()),
    })
}

/// ISO-BMFF `ftyp` box with a HEIF major brand.
fn is_heif(bytes: &[u8]) -> bool {
    match (bytes.get(4..8), bytes.get(8..12)) {
        (Some(tag), Some(brand)) if tag == b"ftyp" => {
            HEIF_BRANDS.iter().any(|b| b.as_slice() == brand)
        }
        _ => false,
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        other => format!("{other:?}").to_uppercase(),
    }
}

fn mode_name(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F",
        ColorType::Rgba32F => "RGBA;F",
        other => return format!("{other:?}"),
    }
    .to_string()
}
