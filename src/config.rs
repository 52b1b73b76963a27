//! Engine configuration.
//!
//! Settings are stored as versioned JSON. Every field has a serde default so
//! files written by older versions keep loading.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::manager::KeyframeInference;
use crate::raster::painter::TipShape;

/// Log level setting for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Engine configuration that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version of the configuration file format
    pub version: u32,

    #[serde(default)]
    pub preferences: EditorPreferences,

    #[serde(default)]
    pub frames: FrameLoaderConfig,

    #[serde(default)]
    pub tools: ToolSettings,

    /// Key name to tool name
    #[serde(default = "default_hotkeys")]
    pub hotkeys: BTreeMap<String, String>,
}

/// General editor preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorPreferences {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Undo entries kept before the oldest is dropped
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default = "default_playback_fps")]
    pub playback_fps: u32,

    /// How video annotations are resolved between keyframes
    #[serde(default)]
    pub keyframe_inference: KeyframeInference,
}

fn default_max_history() -> usize {
    100
}

fn default_playback_fps() -> u32 {
    30
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            max_history: default_max_history(),
            playback_fps: default_playback_fps(),
            keyframe_inference: KeyframeInference::default(),
        }
    }
}

/// Frame loader settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameLoaderConfig {
    /// Parallel fetches, and worker threads
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Fetch low-quality placeholders before full frames
    #[serde(default = "default_lq_first")]
    pub lq_first: bool,
}

fn default_concurrency() -> usize {
    2
}

fn default_lq_first() -> bool {
    true
}

impl Default for FrameLoaderConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            lq_first: default_lq_first(),
        }
    }
}

/// Tool tuning values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Hit-test distance in canvas pixels
    #[serde(default = "default_hit_threshold")]
    pub hit_threshold: f64,

    /// Douglas-Peucker tolerance applied to finished polygons, in image pixels
    #[serde(default = "default_simplify_epsilon")]
    pub simplify_epsilon: f64,

    /// Brush diameter in image pixels
    #[serde(default = "default_brush_size")]
    pub brush_size: f64,

    /// Vertices of the polygon approximating a round brush tip
    #[serde(default = "default_brush_sides")]
    pub brush_sides: u32,

    #[serde(default)]
    pub brush_tip: TipShape,
}

fn default_hit_threshold() -> f64 {
    5.5
}

fn default_simplify_epsilon() -> f64 {
    0.5
}

fn default_brush_size() -> f64 {
    10.0
}

fn default_brush_sides() -> u32 {
    12
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            hit_threshold: default_hit_threshold(),
            simplify_epsilon: default_simplify_epsilon(),
            brush_size: default_brush_size(),
            brush_sides: default_brush_sides(),
            brush_tip: TipShape::default(),
        }
    }
}

fn default_hotkeys() -> BTreeMap<String, String> {
    [
        ("s", "select"),
        ("e", "bounding_box"),
        ("r", "polygon"),
        ("b", "brush"),
        ("m", "mask_brush"),
        ("a", "auto_annotate"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: EditorPreferences::default(),
            frames: FrameLoaderConfig::default(),
            tools: ToolSettings::default(),
            hotkeys: default_hotkeys(),
        }
    }

    /// Tool bound to `key`, if any.
    pub fn tool_for_key(&self, key: &str) -> Option<&str> {
        self.hotkeys.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "annotate-config.json"
    }

    /// Get the default config file path for auto-load/save.
    pub fn default_path() -> Option<std::path::PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("annotate").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("annotate")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load_from(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save_to(&path)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Install `env_logger` at the configured level.
///
/// `RUST_LOG` still overrides the level. Calling this twice is harmless.
pub fn init_logging(config: &EngineConfig) {
    let result = env_logger::Builder::new()
        .filter_level(config.preferences.log_level.to_level_filter())
        .parse_default_env()
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
