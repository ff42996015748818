use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the metapho library.
///
/// Controls reverse geocoding, which optional metadata sections are read,
/// and how reports are rendered. Every field has a default, so a partial
/// JSON file is enough.
///
/// # Loading
///
/// ```rust,no_run
/// use metapho::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.geocoder.enabled = false;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Reverse geocoding service settings.
    pub geocoder: GeocoderConfig,
    pub iptc: IptcConfig,
    pub xmp: XmpConfig,
    /// Report rendering.
    pub output: OutputConfig,
}

/// Nominatim-compatible reverse geocoding service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    /// If `false`, GPS blocks get a "Reverse geocoding disabled" note instead of an address.
    pub enabled: bool,
    /// Full URL of the `/reverse` endpoint.
    pub endpoint: String,
    /// Sent as `User-Agent`; Nominatim's usage policy requires one.
    pub user_agent: String,
    /// Preferred address language (`accept-language`).
    pub language: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: "photo_metadata_viewer".to_string(),
            language: "en".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IptcConfig {
    pub enabled: bool,
}

impl Default for IptcConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct XmpConfig {
    pub enabled: bool,
}

impl Default for XmpConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Default rendering for the command-line tool.
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Text,
    Html,
    Json,
}

impl Config {
    /// Resolve the config file path: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
