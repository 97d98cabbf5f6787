// ABOUTME: Application configuration handling.
// ABOUTME: Loads and saves the effect chain and snap settings from TOML config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::effects::{
    BlendFunction, CrtSettings, DepthCueingSettings, DitherPattern, DitheringSettings,
    EffectConfig, ToneMappingSettings, VertexSnapSettings,
};

/// Output frame settings for the demo renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    pub width: u32,
    pub height: u32,
    /// Frames to render
    pub frames: u32,
    /// Simulated frame interval in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            frames: 60,
            frame_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vertex snapping applied to every projected vertex
    pub vertex_snap: VertexSnapSettings,

    /// Output frame settings
    pub frame: FrameSettings,

    /// Ordered effect chain, evaluated first to last
    pub effects: Vec<EffectConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self::psx()
    }
}

impl Config {
    /// The classic chain: tone mapping, dithering, fog, then the CRT monitor
    pub fn psx() -> Self {
        Self {
            vertex_snap: VertexSnapSettings::default(),
            frame: FrameSettings::default(),
            effects: vec![
                EffectConfig::ToneMapping(ToneMappingSettings::default()),
                EffectConfig::Dithering(DitheringSettings {
                    pattern: DitherPattern::Bayer4,
                    darkness: 0.2,
                    color_depth: 16,
                    blend: BlendFunction::Screen,
                }),
                EffectConfig::DepthCueing(DepthCueingSettings {
                    near_offset: 0.04,
                    fog_density: 0.1,
                    ..Default::default()
                }),
                EffectConfig::Crt(CrtSettings {
                    vignette_opacity: 1.6,
                    gamma: 0.9,
                    ..Default::default()
                }),
            ],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

impl Config {
    /// Get the default config file path (~/.config/psx-post/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("psx-post").join("config.toml"))
    }

    /// Load config from a path
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load config from default path, or return default config if not found
    pub fn load_or_default() -> Self {
        Self::default_path()
            .and_then(|path| Self::load(&path).ok())
            .unwrap_or_default()
    }

    /// Save config to a path
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to default path
    pub fn save_to_default(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::ReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save(&path)?;
        Ok(path)
    }
}
