//! EXIF reading and normalization.
//!
//! - [`read_exif`]: decode the EXIF IFDs of an in-memory image into [`RawExif`]
//! - [`normalize`]: turn [`RawExif`] into named report items, including the
//!   GPS block, derived coordinates and the optional reverse-geocoded address
//! - [`dms_to_decimal`]: degrees/minutes/seconds → signed decimal degrees

#[cfg(test)]
pub(crate) mod fixtures;
mod gps;
mod normalize;
mod reader;
pub mod tags;
mod value;

pub use gps::{Coordinate, derive_coordinate, dms_to_decimal};
pub use normalize::normalize;
pub use reader::{RawExif, read_exif};
pub use value::TagValue;
