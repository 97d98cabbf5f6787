// ABOUTME: Dithering stage: ordered-dither color depth reduction per channel.
// ABOUTME: Threshold comes from the pattern tile under the fragment coordinate.

use bytemuck::{Pod, Zeroable};

use psx_core::{BlendFunction, Color, DitherPattern, DitheringSettings, EffectConfig};

use super::{finite_or, Effect, Staged};
use crate::dither::{biased_threshold, clamp_levels, reduce, threshold_at};
use crate::framebuffer::Fragment;
use crate::pipeline::FrameState;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DitheringUniforms {
    /// Index into [`DitherPattern::all`]
    pub pattern: u32,
    pub darkness: f32,
    /// Quantization steps per channel, already clamped
    pub levels: i32,
    _pad: u32,
}

impl DitheringUniforms {
    pub fn from_settings(settings: &DitheringSettings) -> Self {
        let pattern = DitherPattern::all()
            .iter()
            .position(|p| *p == settings.pattern)
            .unwrap_or(1) as u32;
        Self {
            pattern,
            darkness: finite_or(settings.darkness, DitheringSettings::default().darkness),
            levels: clamp_levels(settings.color_depth.saturating_sub(1)),
            _pad: 0,
        }
    }
}

pub struct DitheringEffect {
    settings: Staged<DitheringSettings>,
    uniforms: DitheringUniforms,
}

impl DitheringEffect {
    pub fn new(settings: DitheringSettings) -> Self {
        let uniforms = DitheringUniforms::from_settings(&settings);
        Self {
            settings: Staged::new(settings),
            uniforms,
        }
    }

    pub fn set_settings(&mut self, settings: DitheringSettings) {
        self.settings.stage(settings);
    }

    pub fn uniforms(&self) -> &DitheringUniforms {
        &self.uniforms
    }
}

impl Effect for DitheringEffect {
    fn name(&self) -> &'static str {
        "dithering"
    }

    fn blend(&self) -> BlendFunction {
        self.settings.live().blend
    }

    fn update(&mut self, _frame: &FrameState) {
        if self.settings.commit() {
            let live = self.settings.live();
            tracing::debug!(
                "Dithering now {} with {} colors",
                live.pattern.label(),
                live.color_depth
            );
            self.uniforms = DitheringUniforms::from_settings(live);
        }
    }

    fn shade(&self, input: Color, fragment: &Fragment) -> Color {
        let u = &self.uniforms;
        let pattern = self.settings.live().pattern;
        let [x, y] = fragment.frag_coord();
        let t = biased_threshold(threshold_at(pattern, x, y), u.darkness);

        Color::rgba(
            reduce(input.r, t, u.levels),
            reduce(input.g, t, u.levels),
            reduce(input.b, t, u.levels),
            1.0,
        )
    }

    fn uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }

    fn set_config(&mut self, config: EffectConfig) -> Result<(), EffectConfig> {
        match config {
            EffectConfig::Dithering(settings) => {
                self.set_settings(settings);
                Ok(())
            }
            other => Err(other),
        }
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Dithering(self.settings.latest().clone())
    }
}
