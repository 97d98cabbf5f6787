// ABOUTME: Tone mapping stage compressing scene color into the displayable range.
// ABOUTME: Runs first in the chain so dithering quantizes display values.

use bytemuck::{Pod, Zeroable};

use psx_core::{BlendFunction, Color, EffectConfig, ToneMappingMode, ToneMappingSettings};

use super::{finite_or, Effect, Staged};
use crate::framebuffer::Fragment;
use crate::pipeline::FrameState;

const START_COMPRESSION: f32 = 0.8 - 0.04;
const DESATURATION: f32 = 0.15;

/// Khronos PBR Neutral operator
pub fn neutral(color: Color) -> Color {
    let x = color.min_channel();
    let offset = if x < 0.08 { x - 6.25 * x * x } else { 0.04 };
    let color = color.map_rgb(|c| c - offset);

    let peak = color.max_channel();
    if peak < START_COMPRESSION {
        return color;
    }

    let d = 1.0 - START_COMPRESSION;
    let new_peak = 1.0 - d * d / (peak + d - START_COMPRESSION);
    let color = color.scale_rgb(new_peak / peak);

    let g = 1.0 - 1.0 / (DESATURATION * (peak - new_peak) + 1.0);
    color.map_rgb(|c| c * (1.0 - g) + new_peak * g)
}

pub fn reinhard(color: Color) -> Color {
    color.map_rgb(|c| c / (1.0 + c))
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ToneMappingUniforms {
    pub mode: u32,
    pub exposure: f32,
    _pad: [u32; 2],
}

impl ToneMappingUniforms {
    pub fn from_settings(settings: &ToneMappingSettings) -> Self {
        let mode = match settings.mode {
            ToneMappingMode::Neutral => 0,
            ToneMappingMode::Reinhard => 1,
            ToneMappingMode::Linear => 2,
        };
        Self {
            mode,
            exposure: finite_or(settings.exposure, 1.0).max(0.0),
            _pad: [0; 2],
        }
    }
}

pub struct ToneMappingEffect {
    settings: Staged<ToneMappingSettings>,
    uniforms: ToneMappingUniforms,
}

impl ToneMappingEffect {
    pub fn new(settings: ToneMappingSettings) -> Self {
        let uniforms = ToneMappingUniforms::from_settings(&settings);
        Self {
            settings: Staged::new(settings),
            uniforms,
        }
    }

    pub fn set_settings(&mut self, settings: ToneMappingSettings) {
        self.settings.stage(settings);
    }
}

impl Effect for ToneMappingEffect {
    fn name(&self) -> &'static str {
        "tone_mapping"
    }

    fn blend(&self) -> BlendFunction {
        self.settings.live().blend
    }

    fn update(&mut self, _frame: &FrameState) {
        if self.settings.commit() {
            tracing::debug!("Tone mapping settings updated: {:?}", self.settings.live());
            self.uniforms = ToneMappingUniforms::from_settings(self.settings.live());
        }
    }

    fn shade(&self, input: Color, _fragment: &Fragment) -> Color {
        let exposed = input.map_rgb(|c| (c * self.uniforms.exposure).max(0.0));
        let mapped = match self.settings.live().mode {
            ToneMappingMode::Neutral => neutral(exposed),
            ToneMappingMode::Reinhard => reinhard(exposed),
            ToneMappingMode::Linear => exposed,
        };
        mapped.map_rgb(|c| c.clamp(0.0, 1.0))
    }

    fn uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }

    fn set_config(&mut self, config: EffectConfig) -> Result<(), EffectConfig> {
        match config {
            EffectConfig::ToneMapping(settings) => {
                self.set_settings(settings);
                Ok(())
            }
            other => Err(other),
        }
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::ToneMapping(self.settings.latest().clone())
    }
}
