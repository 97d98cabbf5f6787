// ABOUTME: Shared types and configuration for psx-post.
// ABOUTME: Defines colors, effect settings, and config file handling.

pub mod color;
pub mod config;
pub mod effects;

pub use color::Color;
pub use config::{Config, ConfigError, FrameSettings};
pub use effects::{
    BlendFunction, CrtSettings, DepthCueingSettings, DitherPattern, DitheringSettings,
    EffectConfig, ToneMappingMode, ToneMappingSettings, VertexSnapSettings,
};
