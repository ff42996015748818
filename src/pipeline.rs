use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{MetaError, Result};
use crate::exif::{self, RawExif};
use crate::geocode::{Geocoder, NominatimGeocoder};
use crate::iptc;
use crate::loader::{self, FileInfo};
use crate::report::{Item, Report, Section, SectionKind};
use crate::xmp;

/// Supported image extensions.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "tif", "tiff",
    // EXIF only, pixels are not decoded
    "heic", "heif",
];

/// Builds metadata reports.
///
/// Holds the optional collaborators (reverse geocoder, IPTC and XMP
/// readers) so they are set up once and reused for every image.
///
/// # Example
///
/// ```rust,no_run
/// use metapho::config::Config;
/// use metapho::pipeline::Extractor;
/// use std::path::Path;
///
/// # async fn example() -> metapho::error::Result<()> {
/// let extractor = Extractor::from_config(&Config::default());
/// let report = extractor.extract(Path::new("photo.jpg")).await?;
/// print!("{}", report.to_text());
/// # Ok(())
/// # }
/// ```
pub struct Extractor {
    geocoder: Option<Box<dyn Geocoder>>,
    iptc_enabled: bool,
    xmp_enabled: bool,
}

impl Extractor {
    /// Extractor with every section enabled.
    pub fn new(geocoder: Option<Box<dyn Geocoder>>) -> Self {
        Self {
            geocoder,
            iptc_enabled: true,
            xmp_enabled: true,
        }
    }

    pub fn with_iptc(mut self, enabled: bool) -> Self {
        self.iptc_enabled = enabled;
        self
    }

    pub fn with_xmp(mut self, enabled: bool) -> Self {
        self.xmp_enabled = enabled;
        self
    }

    /// Build the extractor described by `config`.
    ///
    /// A geocoder that cannot be constructed is kept as one that always
    /// fails, so GPS blocks explain why no address is shown.
    pub fn from_config(config: &Config) -> Self {
        let geocoder: Option<Box<dyn Geocoder>> = if config.geocoder.enabled {
            match NominatimGeocoder::new(&config.geocoder) {
                Ok(g) => Some(Box::new(g)),
                Err(e) => {
                    log::warn!("Geocoder setup failed: {e}");
                    Some(Box::new(UnavailableGeocoder(e.to_string())))
                }
            }
        } else {
            log::debug!("Reverse geocoding disabled by config");
            None
        };

        Self::new(geocoder)
            .with_iptc(config.iptc.enabled)
            .with_xmp(config.xmp.enabled)
    }

    /// Read a file and build its report.
    ///
    /// Fails only when the file cannot be read or is not a decodable image.
    pub async fn extract(&self, path: &Path) -> Result<Report> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.extract_bytes(&name, &bytes).await
    }

    /// Build the report of an in-memory image.
    pub async fn extract_bytes(&self, name: &str, bytes: &[u8]) -> Result<Report> {
        let raw = exif::read_exif(bytes);
        let file_info = loader::probe(name, bytes, raw.as_ref())?;
        log::debug!(
            "{name}: {} {:?}, EXIF {}",
            file_info.format,
            file_info.dimensions,
            if raw.is_some() { "present" } else { "absent" }
        );

        let exif = self.exif_section(raw.as_ref()).await;
        let iptc = self.iptc_section(bytes);
        let xmp = self.xmp_section(bytes);
        Ok(Self::assemble(exif, iptc, xmp, &file_info))
    }

    /// Put the sections in report order: EXIF, IPTC, XMP, File Information.
    pub fn assemble(exif: Section, iptc: Section, xmp: Section, file_info: &FileInfo) -> Report {
        Report {
            sections: vec![
                exif,
                iptc,
                xmp,
                Section::new(SectionKind::FileInfo, file_info.items()),
            ],
        }
    }

    pub async fn exif_section(&self, raw: Option<&RawExif>) -> Section {
        match raw.filter(|r| !r.is_empty()) {
            Some(raw) => Section::new(
                SectionKind::Exif,
                exif::normalize(raw, self.geocoder.as_deref()).await,
            ),
            None => Section::placeholder(SectionKind::Exif, "No EXIF data found"),
        }
    }

    pub fn iptc_section(&self, bytes: &[u8]) -> Section {
        if !self.iptc_enabled {
            return Section::placeholder(SectionKind::Iptc, MetaError::IptcUnavailable.to_string());
        }
        match iptc::read_iptc(bytes) {
            Ok(Some(fields)) if !fields.is_empty() => Section::new(
                SectionKind::Iptc,
                fields
                    .into_iter()
                    .map(|(name, value)| Item::field(name, value.to_string()))
                    .collect(),
            ),
            Ok(_) => Section::placeholder(SectionKind::Iptc, "No IPTC data found"),
            Err(e) => {
                log::warn!("{e}");
                Section::placeholder(SectionKind::Iptc, e.to_string())
            }
        }
    }

    pub fn xmp_section(&self, bytes: &[u8]) -> Section {
        if !self.xmp_enabled {
            return Section::placeholder(SectionKind::Xmp, MetaError::XmpUnavailable.to_string());
        }
        match xmp::extract(bytes) {
            Ok(Some(items)) if !items.is_empty() => Section::new(SectionKind::Xmp, items),
            Ok(_) => Section::placeholder(SectionKind::Xmp, "No XMP data found"),
            Err(e) => {
                log::warn!("{e}");
                Section::placeholder(SectionKind::Xmp, e.to_string())
            }
        }
    }
}

/// Stand-in for a geocoder whose HTTP client could not be built.
struct UnavailableGeocoder(String);

#[async_trait::async_trait]
impl Geocoder for UnavailableGeocoder {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn reverse(&self, _coord: exif::Coordinate) -> Result<Option<crate::geocode::Address>> {
        Err(MetaError::GeocoderUnavailable(self.0.clone()))
    }
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks).
///
/// # Example
///
/// ```rust,no_run
/// use metapho::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./photos/"),        // entire directory
/// ]);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
