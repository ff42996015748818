//! # metapho
//!
//! Photo metadata viewer: extracts EXIF (with GPS coordinates and an optional
//! reverse-geocoded address), IPTC and XMP metadata plus basic file
//! information from an image, and renders it as a sectioned report.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metapho::config::Config;
//! use metapho::pipeline::{collect_images, Extractor};
//! use metapho::report::render_error_text;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let extractor = Extractor::from_config(&config);
//!
//!     for path in collect_images(&[PathBuf::from("./photos")]) {
//!         match extractor.extract(&path).await {
//!             Ok(report) => print!("{}", report.to_text()),
//!             Err(e) => eprint!("{}", render_error_text(&e)),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! ```rust,no_run
//! use metapho::exif::{normalize, read_exif};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let bytes = std::fs::read("photo.jpg")?;
//! if let Some(raw) = read_exif(&bytes) {
//!     for item in normalize(&raw, None).await {
//!         println!("{item:?}");
//!     }
//! }
//! let xmp = metapho::xmp::extract(&bytes)?;
//! let iptc = metapho::iptc::read_iptc(&bytes)?;
//! # let _ = (xmp, iptc);
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | EXIF | IPTC | XMP |
//! |--------|------|------|-----|
//! | JPEG (`.jpg`, `.jpeg`) | yes | APP13 | yes |
//! | TIFF (`.tif`, `.tiff`) | yes | IPTC-NAA / Photoshop tag | yes |
//! | PNG (`.png`) | yes | no | yes |
//! | WebP (`.webp`) | yes | no | yes |
//! | HEIC/HEIF (`.heic`, `.heif`) | yes | no | yes |
//!
//! ## Modules
//!
//! - [`config`]: Configuration types and loading/saving
//! - [`error`]: Library error type
//! - [`exif`]: EXIF reading, tag names, GPS conversion
//! - [`geocode`]: Reverse geocoding service trait and Nominatim client
//! - [`iptc`]: IPTC-IIM reader
//! - [`loader`]: Image probing and file information
//! - [`pipeline`]: Report assembly and image collection
//! - [`report`]: Report model and text/HTML renderers
//! - [`xmp`]: XMP packet location, parsing and flattening

pub mod config;
pub mod error;
pub mod exif;
pub mod geocode;
pub mod iptc;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod xmp;
