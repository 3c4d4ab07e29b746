use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// A broken config is fatal to map creation: the app surfaces a notice and
/// runs with an empty, inert map. There is no retry.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The per-client customization file. Everything the core consumes is
/// injected from here before any component starts.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub map: MapConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub client: ClientInfo,
    #[serde(default)]
    pub banners: BannerConfig,
    #[serde(default)]
    pub brand: Option<BrandLogo>,
    #[serde(default)]
    pub pins: PinConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    /// Initial center as [longitude, latitude]
    pub center: [f64; 2],
    /// Initial zoom level
    pub zoom: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    /// Named GeoJSON linework layers, back to front
    #[serde(default)]
    pub basemap: Vec<BasemapLayerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasemapLayerConfig {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Path to the listings CSV file
    pub csv_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    #[serde(default = "default_client_name")]
    pub name: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: default_client_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerConfig {
    /// Premium position: a single static banner, top center
    #[serde(default)]
    pub premium: Option<Banner>,
    /// Rotating slideshow shown below the premium banner
    #[serde(default)]
    pub rotating: Vec<Banner>,
    #[serde(default = "default_slideshow_interval")]
    pub interval_ms: u64,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            premium: None,
            rotating: Vec::new(),
            interval_ms: default_slideshow_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Banner {
    pub text: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Map-maker attribution block, bottom right.
#[derive(Debug, Clone, Deserialize)]
pub struct BrandLogo {
    pub text: String,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PinConfig {
    /// Hex color like "#001f3f"
    #[serde(default = "default_pin_color")]
    pub color: String,
    /// Optional custom pin glyph overriding the standard one
    #[serde(default)]
    pub glyph: Option<char>,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            color: default_pin_color(),
            glyph: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_placeholder")]
    pub placeholder: String,
    /// Listing attributes the search term is matched against
    #[serde(default = "default_search_fields")]
    pub fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            placeholder: default_search_placeholder(),
            fields: default_search_fields(),
        }
    }
}

fn default_min_zoom() -> f64 {
    3.0
}

fn default_max_zoom() -> f64 {
    18.0
}

fn default_client_name() -> String {
    "Chamber of Commerce Interactive Map".to_string()
}

fn default_slideshow_interval() -> u64 {
    7000
}

fn default_pin_color() -> String {
    "#001f3f".to_string()
}

fn default_true() -> bool {
    true
}

fn default_search_placeholder() -> String {
    "Search businesses...".to_string()
}

fn default_search_fields() -> Vec<String> {
    vec!["name".to_string()]
}

impl ClientConfig {
    /// Load and validate the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let [lon, lat] = self.map.center;
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(ConfigError::Invalid(format!(
                "map center [{lon}, {lat}] out of range"
            )));
        }
        if self.map.min_zoom > self.map.max_zoom {
            return Err(ConfigError::Invalid(
                "min_zoom greater than max_zoom".to_string(),
            ));
        }
        if !self.map.zoom.is_finite() {
            return Err(ConfigError::Invalid("zoom is not a number".to_string()));
        }
        if self.data.csv_path.trim().is_empty() {
            return Err(ConfigError::Invalid("data.csv_path is empty".to_string()));
        }
        Ok(())
    }

    /// Minimal inert configuration used when the real one fails to load,
    /// so the UI can still come up and show the notice.
    pub fn fallback() -> Self {
        Self {
            map: MapConfig {
                center: [0.0, 0.0],
                zoom: 2.0,
                min_zoom: default_min_zoom(),
                max_zoom: default_max_zoom(),
                basemap: Vec::new(),
            },
            data: DataConfig {
                csv_path: String::new(),
            },
            client: ClientInfo::default(),
            banners: BannerConfig::default(),
            brand: None,
            pins: PinConfig::default(),
            search: SearchConfig::default(),
        }
    }

    /// Pin color, falling back to the default navy on malformed hex.
    pub fn pin_color(&self) -> Color {
        parse_hex_color(&self.pins.color).unwrap_or(Color::Rgb(0x00, 0x1f, 0x3f))
    }
}

fn parse_hex_color(text: &str) -> Option<Color> {
    let hex = text.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "map": { "center": [-81.73, 28.80], "zoom": 12 },
            "data": { "csv_path": "data/advertisers.csv" }
        }"#
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: ClientConfig = serde_json::from_str(minimal_json()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.map.min_zoom, 3.0);
        assert_eq!(config.map.max_zoom, 18.0);
        assert_eq!(config.search.fields, vec!["name".to_string()]);
        assert_eq!(config.banners.interval_ms, 7000);
        assert!(config.banners.premium.is_none());
    }

    #[test]
    fn test_center_out_of_range_rejected() {
        let json = r#"{
            "map": { "center": [-200.0, 28.80], "zoom": 12 },
            "data": { "csv_path": "data/advertisers.csv" }
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zoom_bounds_rejected_when_inverted() {
        let json = r#"{
            "map": { "center": [0.0, 0.0], "zoom": 12, "min_zoom": 10, "max_zoom": 5 },
            "data": { "csv_path": "x.csv" }
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pin_color_parse_and_fallback() {
        let mut config: ClientConfig = serde_json::from_str(minimal_json()).unwrap();
        config.pins.color = "#2d8659".to_string();
        assert_eq!(config.pin_color(), Color::Rgb(0x2d, 0x86, 0x59));

        config.pins.color = "teal".to_string();
        assert_eq!(config.pin_color(), Color::Rgb(0x00, 0x1f, 0x3f));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let json = r#"{
            "map": { "center": [0.0, 0.0], "zoom": 4 },
            "data": { "csv_path": "x.csv" },
            "mapbox_token": "pk.legacy"
        }"#;
        assert!(serde_json::from_str::<ClientConfig>(json).is_ok());
    }
}
