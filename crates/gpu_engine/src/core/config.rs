//! Configuration system
//!
//! Engine settings are plain serde types which can be loaded from and saved
//! to TOML or RON files through the [`Config`] trait. The file format is
//! chosen by extension.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gpu::pixel_format::PixelFormat;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;

        match format {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A setting has a value that cannot be used
    #[error("Invalid setting {setting}: {reason}")]
    Invalid {
        /// Name of the setting
        setting: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// GPU backend implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// GL backend over the in-memory software device
    #[default]
    GlSoft,
    /// GL backend over a native driver
    GlNative,
}

/// Main window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Colour buffer format
    pub format: PixelFormat,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "GPU Engine".to_string(),
            width: 1280,
            height: 720,
            format: PixelFormat::R8G8B8A8,
        }
    }
}

impl WindowConfig {
    /// Set the window title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the window size
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the colour buffer format
    pub const fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Check that the window can be created
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid {
                setting: "window size",
                reason: format!("{}x{} has no area", self.width, self.height),
            });
        }

        if !self.format.is_colour() {
            return Err(ConfigError::Invalid {
                setting: "window format",
                reason: format!("{:?} is not a colour format", self.format),
            });
        }

        Ok(())
    }
}

/// Graphics configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Backend to create
    pub backend: BackendKind,
    /// Whether to validate render pass instances
    pub validation: Option<bool>,
    /// Main window settings
    pub window: WindowConfig,
}

impl GraphicsConfig {
    /// Set the backend
    pub const fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the main window settings
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Enable or disable render pass validation
    pub const fn with_validation(mut self, enable: bool) -> Self {
        self.validation = Some(enable);
        self
    }

    /// Whether validation is on, defaulting to on for debug builds
    pub fn validation_enabled(&self) -> bool {
        self.validation.unwrap_or(cfg!(debug_assertions))
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Graphics settings
    pub graphics: GraphicsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            graphics: GraphicsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the default log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the graphics settings
    pub fn with_graphics(mut self, graphics: GraphicsConfig) -> Self {
        self.graphics = graphics;
        self
    }

    /// Check every setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                setting: "log level",
                reason: "empty filter".to_string(),
            });
        }

        self.graphics.window.validate()
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("gpu_engine_{}_{}", std::process::id(), name))
    }

    fn sample_config() -> EngineConfig {
        EngineConfig::default().with_log_level("debug").with_graphics(
            GraphicsConfig::default()
                .with_validation(true)
                .with_window(WindowConfig::default().with_title("Cubes").with_size(800, 600)),
        )
    }

    #[test]
    fn test_toml_round_trip() {
        let path = temp_path("engine.toml");
        let config = sample_config();

        config.save_to_file(&path).expect("save failed");
        let loaded = EngineConfig::load_from_file(&path).expect("load failed");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let path = temp_path("engine.ron");
        let config = sample_config().with_graphics(GraphicsConfig::default().with_backend(BackendKind::GlNative));

        config.save_to_file(&path).expect("save failed");
        let loaded = EngineConfig::load_from_file(&path).expect("load failed");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [graphics.window]
            width = 320
            height = 240
            "#,
        )
        .expect("parse failed");

        assert_eq!(config.log_level, "info");
        assert_eq!(config.graphics.window.width, 320);
        assert_eq!(config.graphics.window.title, "GPU Engine");
        assert_eq!(config.graphics.validation, None);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = EngineConfig::load_from_file("engine.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));

        let result = sample_config().save_to_file(temp_path("engine.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_validation_default_follows_build() {
        assert_eq!(GraphicsConfig::default().validation_enabled(), cfg!(debug_assertions));
        assert!(!GraphicsConfig::default().with_validation(false).validation_enabled());
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let empty = WindowConfig::default().with_size(0, 480);
        assert!(matches!(
            empty.validate(),
            Err(ConfigError::Invalid {
                setting: "window size",
                ..
            })
        ));

        let depth = WindowConfig::default().with_format(PixelFormat::Depth32);
        assert!(depth.validate().is_err());

        assert!(sample_config().validate().is_ok());
    }
}
