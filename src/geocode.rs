//! Reverse geocoding: decimal coordinates → human-readable address.
//!
//! The [`Geocoder`] trait is the seam the pipeline depends on. The library
//! ships [`NominatimGeocoder`], which talks to an OpenStreetMap Nominatim
//! compatible `/reverse` endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeocoderConfig;
use crate::error::{MetaError, Result};
use crate::exif::Coordinate;

/// A resolved address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    /// Full one-line address.
    pub display_name: String,
    /// State / province component, when the service returns one.
    pub state: Option<String>,
    /// The service's raw response body.
    pub raw: serde_json::Value,
}

/// Trait for reverse-geocoding services.
///
/// Implementations must never panic on network failure; return
/// [`MetaError::Geocoding`] instead so the report can show a note.
///
/// # Example
///
/// ```rust,no_run
/// use metapho::config::GeocoderConfig;
/// use metapho::exif::Coordinate;
/// use metapho::geocode::{Geocoder, NominatimGeocoder};
///
/// # async fn example() -> metapho::error::Result<()> {
/// let geocoder = NominatimGeocoder::new(&GeocoderConfig::default())?;
/// let coord = Coordinate::new(40.446111, -79.948611)?;
/// if let Some(address) = geocoder.reverse(coord).await? {
///     println!("{}", address.display_name);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Display name of the service.
    fn name(&self) -> &str;
    /// Resolve `coord` to an address. `Ok(None)` means the service had no match.
    async fn reverse(&self, coord: Coordinate) -> Result<Option<Address>>;
}

pub struct NominatimGeocoder {
    endpoint: String,
    user_agent: String,
    language: String,
    client: Client,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MetaError::GeocoderUnavailable(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            user_agent: config.user_agent.clone(),
            language: config.language.clone(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    error: Option<String>,
    #[serde(default)]
    address: serde_json::Map<String, serde_json::Value>,
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "Nominatim"
    }

    async fn reverse(&self, coord: Coordinate) -> Result<Option<Address>> {
        log::debug!(
            "Reverse geocoding {:.6}, {:.6} as {}",
            coord.latitude,
            coord.longitude,
            self.user_agent
        );

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coord.latitude.to_string()),
                ("lon", coord.longitude.to_string()),
                ("accept-language", self.language.clone()),
            ])
            .send()
            .await
            .map_err(describe_request_error)?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| MetaError::Geocoding(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(MetaError::Geocoding(format!("service error ({status}): {text}")));
        }

        parse_response(&text)
    }
}

/// Turn a Nominatim JSON body into an [`Address`].
fn parse_response(text: &str) -> Result<Option<Address>> {
    let raw: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| MetaError::Geocoding(format!("malformed response: {e}")))?;
    let parsed: NominatimResponse = serde_json::from_value(raw.clone())
        .map_err(|e| MetaError::Geocoding(format!("unexpected response: {e}")))?;

    if let Some(err) = parsed.error {
        log::debug!("Geocoder reported: {err}");
        return Ok(None);
    }
    let Some(display_name) = parsed.display_name else {
        return Ok(None);
    };

    let state = parsed
        .address
        .get("state")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(Some(Address {
        display_name,
        state,
        raw,
    }))
}

fn describe_request_error(e: reqwest::Error) -> MetaError {
    if e.is_connect() {
        MetaError::Geocoding(
            "Connection refused. Check your internet connection or try again later.".into(),
        )
    } else if e.is_timeout() {
        MetaError::Geocoding("request timed out".into())
    } else {
        MetaError::Geocoding(e.to_string())
    }
}
