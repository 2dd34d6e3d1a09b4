//! Configuration file management
//!
//! Loads TOML configuration files and provides renderer settings.
//! Default config path: ~/.config/spritegl/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Nearest-neighbor texture filtering for pixel-accurate rendering
    /// (linear otherwise)
    pub pixel_perfect: bool,
    /// Treat shader compile/link failures as hard errors carrying the
    /// driver's log. When false, failures are logged and the broken program
    /// is used anyway.
    pub strict_shaders: bool,
    /// Per-frame clear color (hex RRGGBB, "#" prefix optional)
    pub clear_color: String,
    /// Present the batch surface directly instead of copying it onto an
    /// external surface
    pub overlay_present: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            pixel_perfect: false,
            strict_shaders: cfg!(debug_assertions),
            clear_color: "000000".to_string(),
            overlay_present: false,
        }
    }
}

impl RendererConfig {
    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<std::path::PathBuf> {
        // 1. SPRITEGL_CONFIG environment variable
        if let Ok(path) = std::env::var("SPRITEGL_CONFIG") {
            let p = std::path::Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/spritegl/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("spritegl").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        None
    }

    /// Load configuration with priority:
    /// 1. SPRITEGL_CONFIG environment variable
    /// 2. ~/.config/spritegl/config.toml (user config)
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(path.to_string_lossy().as_ref()) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: RendererConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RendererConfig = toml::from_str("pixel_perfect = true").unwrap();
        assert!(config.pixel_perfect);
        assert_eq!(config.clear_color, "000000");
        assert!(!config.overlay_present);
    }

    #[test]
    fn test_full_toml() {
        let config: RendererConfig = toml::from_str(
            r#"
pixel_perfect = true
strict_shaders = true
clear_color = "1d2021"
overlay_present = true
"#,
        )
        .unwrap();
        assert!(config.strict_shaders);
        assert_eq!(config.clear_color, "1d2021");
        assert!(config.overlay_present);
    }
}
