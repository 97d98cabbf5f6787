// ABOUTME: Post-processing effect parameters.
// ABOUTME: Controls dithering, CRT distortion, depth cueing, tone mapping and vertex snapping.

use serde::{Deserialize, Serialize};

use crate::Color;

/// Ordered-dither threshold matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DitherPattern {
    /// 2x2 Bayer matrix
    Bayer2,
    /// 4x4 Bayer matrix
    #[default]
    Bayer4,
    /// 8x8 Bayer matrix
    Bayer8,
    /// 8x8 clustered-dot matrix
    Cluster8,
}

impl DitherPattern {
    pub fn all() -> &'static [DitherPattern] {
        &[
            DitherPattern::Bayer2,
            DitherPattern::Bayer4,
            DitherPattern::Bayer8,
            DitherPattern::Cluster8,
        ]
    }

    /// Tile edge length in pixels
    pub fn size(&self) -> usize {
        match self {
            DitherPattern::Bayer2 => 2,
            DitherPattern::Bayer4 => 4,
            DitherPattern::Bayer8 | DitherPattern::Cluster8 => 8,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DitherPattern::Bayer2 => "Bayer 2x2",
            DitherPattern::Bayer4 => "Bayer 4x4",
            DitherPattern::Bayer8 => "Bayer 8x8",
            DitherPattern::Cluster8 => "Cluster 8x8",
        }
    }
}

/// How a stage's output is combined with the color it received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlendFunction {
    /// Discard the stage output
    Skip,
    /// Replace the input
    #[default]
    Normal,
    Add,
    Subtract,
    Multiply,
    Screen,
    Darken,
    Lighten,
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToneMappingMode {
    /// Khronos PBR Neutral
    #[default]
    Neutral,
    Reinhard,
    /// Plain clamp to [0, 1]
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DitheringSettings {
    /// Threshold matrix
    pub pattern: DitherPattern,

    /// Bias pulling the dither threshold toward this value (0.0-1.0)
    pub darkness: f32,

    /// Number of output levels per channel (clamped to 2..=257)
    pub color_depth: i32,

    /// Blend of the reduced color over the input
    pub blend: BlendFunction,
}

impl Default for DitheringSettings {
    fn default() -> Self {
        Self {
            pattern: DitherPattern::Bayer4,
            darkness: 0.5,
            color_depth: 16,
            blend: BlendFunction::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrtSettings {
    /// Barrel curvature per axis (larger = flatter)
    pub curvature: [f32; 2],

    /// Bezel color drawn outside the curved screen
    pub border_color: Color,

    /// Scanline exponent (0.0 = invisible)
    pub scanline_opacity: f32,

    /// Scanline count along x and y
    pub scanline_resolution: [f32; 2],

    /// Scanline scroll speed in uv units per second
    pub scanline_speed: f32,

    /// Vignette exponent
    pub vignette_opacity: f32,

    /// Brightness multiplier applied after vignette and scanlines
    pub gamma: f32,

    /// Stage is skipped when no depth buffer is attached
    pub requires_depth: bool,

    pub blend: BlendFunction,
}

impl Default for CrtSettings {
    fn default() -> Self {
        Self {
            curvature: [5.5, 5.5],
            border_color: Color::TRANSPARENT,
            scanline_opacity: 0.1,
            scanline_resolution: [1024.0, 2080.0],
            scanline_speed: 0.001,
            vignette_opacity: 0.5,
            gamma: 0.9,
            requires_depth: true,
            blend: BlendFunction::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthCueingSettings {
    pub fog_color: Color,

    /// Pulled off the camera near plane before remapping depth
    pub near_offset: f32,

    /// Pulled off the camera far plane before remapping depth
    pub far_offset: f32,

    /// Fog strength (0.0 = none)
    pub fog_density: f32,

    /// Camera planes the depth buffer was written with
    pub camera_near: f32,
    pub camera_far: f32,

    pub blend: BlendFunction,
}

impl Default for DepthCueingSettings {
    fn default() -> Self {
        Self {
            fog_color: Color::WHITE,
            near_offset: 0.0,
            far_offset: 0.0,
            fog_density: 0.5,
            camera_near: 0.1,
            camera_far: 20.0,
            blend: BlendFunction::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub mode: ToneMappingMode,
    pub exposure: f32,
    pub blend: BlendFunction,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            mode: ToneMappingMode::Neutral,
            exposure: 1.0,
            blend: BlendFunction::Normal,
        }
    }
}

/// One entry of the ordered effect chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectConfig {
    ToneMapping(ToneMappingSettings),
    Dithering(DitheringSettings),
    DepthCueing(DepthCueingSettings),
    Crt(CrtSettings),
}

impl EffectConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            EffectConfig::ToneMapping(_) => "tone_mapping",
            EffectConfig::Dithering(_) => "dithering",
            EffectConfig::DepthCueing(_) => "depth_cueing",
            EffectConfig::Crt(_) => "crt",
        }
    }

    pub fn blend(&self) -> BlendFunction {
        match self {
            EffectConfig::ToneMapping(s) => s.blend,
            EffectConfig::Dithering(s) => s.blend,
            EffectConfig::DepthCueing(s) => s.blend,
            EffectConfig::Crt(s) => s.blend,
        }
    }
}

/// Low-precision vertex snapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexSnapSettings {
    /// Target low-resolution grid
    pub resolution: [u32; 2],

    /// 0.0 = snap to the full grid, towards 1.0 = coarser grid
    pub jitter_strength: f32,

    /// Disable to use the plain projection
    pub enabled: bool,
}

impl Default for VertexSnapSettings {
    fn default() -> Self {
        Self {
            resolution: [320, 240],
            jitter_strength: 0.8,
            enabled: true,
        }
    }
}
