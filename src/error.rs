use thiserror::Error;

/// Everything that can go wrong while building a metadata report.
///
/// Only [`MetaError::Io`] and [`MetaError::Decode`] abort a report. Every
/// other variant is caught at its section boundary and rendered as a note.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot decode image: {0}")]
    Decode(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Reverse geocoding failed: {0}")]
    Geocoding(String),

    #[error("Reverse geocoding is not available: {0}")]
    GeocoderUnavailable(String),

    #[error("IPTC support not available")]
    IptcUnavailable,

    #[error("IPTC Error: {0}")]
    IptcParse(String),

    #[error("XMP support not available")]
    XmpUnavailable,

    #[error("XMP Parsing Error: {0}")]
    XmpParse(String),
}

impl MetaError {
    /// Whether this error replaces the whole report rather than one section.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MetaError::Io(_) | MetaError::Decode(_))
    }
}

impl From<image::ImageError> for MetaError {
    fn from(err: image::ImageError) -> Self {
        MetaError::Decode(err.to_string())
    }
}

impl From<quick_xml::Error> for MetaError {
    fn from(err: quick_xml::Error) -> Self {
        MetaError::XmpParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MetaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decode_and_io_are_fatal() {
        assert!(MetaError::Decode("bad".into()).is_fatal());
        assert!(MetaError::Io(std::io::Error::other("gone")).is_fatal());
        assert!(!MetaError::InvalidCoordinate("x".into()).is_fatal());
        assert!(!MetaError::Geocoding("offline".into()).is_fatal());
        assert!(!MetaError::IptcUnavailable.is_fatal());
        assert!(!MetaError::XmpParse("eof".into()).is_fatal());
    }

    #[test]
    fn section_messages_match_report_wording() {
        assert_eq!(MetaError::IptcUnavailable.to_string(), "IPTC support not available");
        assert_eq!(
            MetaError::XmpParse("unexpected end".into()).to_string(),
            "XMP Parsing Error: unexpected end"
        );
    }
}
