//! Engine configuration (`engine.toml`).
//!
//! Every field has a default, so a partial file (or no file at all) is valid:
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "Renderer"
//!
//! [renderer]
//! validation = true
//!
//! [logging]
//! filter = "info,renderer_renderer=debug"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logging::DEFAULT_FILTER;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "RENDERER_CONFIG";

/// File name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "engine.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Enable the Khronos validation layer and debug messenger.
    #[serde(default = "default_validation")]
    pub validation: bool,
    /// Application name reported to the Vulkan driver.
    #[serde(default = "default_title")]
    pub app_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_title() -> String {
    "Vulkan Renderer".to_string()
}
fn default_validation() -> bool {
    cfg!(debug_assertions)
}
fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: default_validation(),
            app_name: default_title(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, returning defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Config path from `RENDERER_CONFIG`, else `engine.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Serializes back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero (got {}x{})",
                self.window.width, self.window.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.logging.filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [window]
            width = 800
            title = "demo"

            [renderer]
            validation = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.window.title, "demo");
        assert!(!config.renderer.validation);
        assert_eq!(config.renderer.app_name, "Vulkan Renderer");
    }

    #[test]
    fn test_zero_window_size_is_rejected() {
        let err = EngineConfig::from_toml("[window]\nheight = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = EngineConfig::from_toml("[window\nwidth = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("renderer-config-does-not-exist.toml");
        let config = EngineConfig::load_or_default(&path).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = EngineConfig::default();
        config.window.title = "round".to_string();
        let text = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }
}
