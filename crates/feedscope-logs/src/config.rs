//! Console configuration loaded from TOML

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use feedscope_types::Layer;

use crate::error::{Error, Result};

/// Default Entry Store capacity
pub const DEFAULT_MAX_ENTRIES: usize = 5000;

/// Default fixed row height used for windowing
pub const DEFAULT_ROW_HEIGHT: f64 = 22.0;

/// Default minimum gap, in seconds, that produces a time marker
pub const DEFAULT_GAP_THRESHOLD: f64 = 2.0;

/// Console configuration
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Maximum number of entries kept in the store
    pub max_entries: usize,

    /// Command input history size (owned by the command subsystem)
    pub input_buffer_size: usize,

    /// Fixed row height for the viewport windower
    pub row_height: f64,

    /// Collapse filtered-out runs into expandable groups
    pub hidden_groups: bool,

    /// Time gap markers
    pub gaps: GapConfig,

    /// Known layers and their colours
    pub layers: Vec<LayerConfig>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            input_buffer_size: 20,
            row_height: DEFAULT_ROW_HEIGHT,
            hidden_groups: true,
            gaps: GapConfig::default(),
            layers: Vec::new(),
        }
    }
}

/// Time gap marker settings, shared by the console and exporters
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GapConfig {
    /// Insert gap markers into the console projection
    pub enabled: bool,

    /// Minimum elapsed seconds between two entries
    pub threshold: f64,

    /// Emit gap rows when exporting the raw log
    pub export: bool,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_GAP_THRESHOLD,
            export: true,
        }
    }
}

/// A `[[layers]]` table entry
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LayerConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_layer_color")]
    pub color: String,
}

fn default_layer_color() -> String {
    "#FFFFFF".to_string()
}

impl ConsoleConfig {
    /// Default config file location (`<config dir>/feedscope/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("feedscope").join("config.toml"))
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default location is
    /// tried and a missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path)?;
        let config = Self::from_toml(&content, &path)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if config.max_entries == 0 {
            return Err(Error::config("max_entries must be at least 1"));
        }
        if config.row_height.is_nan() || config.row_height <= 0.0 {
            return Err(Error::config("row_height must be positive"));
        }

        Ok(config)
    }

    /// The usable layer table
    ///
    /// Malformed entries (empty or duplicate names, bad colours) are dropped
    /// with a warning; their layers stay visible by default.
    pub fn layer_table(&self) -> Vec<Layer> {
        let mut seen = HashSet::new();
        let mut layers = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let name = layer.name.trim();
            if name.is_empty() {
                tracing::warn!("Ignoring layer with empty name");
                continue;
            }
            if !is_hex_color(&layer.color) {
                tracing::warn!("Ignoring layer '{}': invalid colour '{}'", name, layer.color);
                continue;
            }
            if !seen.insert(name.to_string()) {
                tracing::warn!("Ignoring duplicate layer '{}'", name);
                continue;
            }
            layers.push(Layer::new(name, layer.color.clone()));
        }

        layers
    }
}

/// Accepts `#RGB`, `#RRGGBB` and `#RRGGBBAA`
fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
