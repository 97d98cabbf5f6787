// ABOUTME: Screen-space effect stages and the trait the composer drives them through.
// ABOUTME: Each stage shades one pixel from its input color, fragment and frame uniforms.

mod crt;
mod depth_cueing;
mod dithering;
mod tone_mapping;

pub use crt::{curve_remap, scanline_intensity, vignette_intensity, CrtEffect, CrtUniforms};
pub use depth_cueing::{fog_factor, DepthCueingEffect, FogUniforms};
pub use dithering::{DitheringEffect, DitheringUniforms};
pub use tone_mapping::{neutral, reinhard, ToneMappingEffect, ToneMappingUniforms};

use psx_core::{BlendFunction, Color, EffectConfig};

use crate::framebuffer::Fragment;
use crate::pipeline::FrameState;

/// A full-screen stage of the effect chain.
///
/// `update` runs once per frame before any pixel is shaded and is the only
/// place settings and time are read. `shade` only sees the snapshot taken
/// there, so a caller replacing settings can never tear a frame.
pub trait Effect: Send {
    fn name(&self) -> &'static str;

    /// Stage passes its input through when no depth buffer is attached
    fn requires_depth(&self) -> bool {
        false
    }

    fn blend(&self) -> BlendFunction;

    /// Apply pending settings and snapshot per-frame uniforms
    fn update(&mut self, frame: &FrameState);

    fn shade(&self, input: Color, fragment: &Fragment) -> Color;

    /// Uniform block as uploaded to a GPU compositor
    fn uniform_bytes(&self) -> &[u8];

    /// Stage new settings for the next frame. Hands the config back if it
    /// belongs to another kind of effect.
    fn set_config(&mut self, config: EffectConfig) -> Result<(), EffectConfig>;

    /// Most recently requested settings, staged or live
    fn config(&self) -> EffectConfig;
}

/// Build the stage described by `config`
pub fn build(config: &EffectConfig) -> Box<dyn Effect> {
    match config {
        EffectConfig::ToneMapping(s) => Box::new(ToneMappingEffect::new(s.clone())),
        EffectConfig::Dithering(s) => Box::new(DitheringEffect::new(s.clone())),
        EffectConfig::DepthCueing(s) => Box::new(DepthCueingEffect::new(s.clone())),
        EffectConfig::Crt(s) => Box::new(CrtEffect::new(s.clone())),
    }
}

/// Live settings plus a replacement waiting for the next frame
#[derive(Debug, Clone)]
pub(crate) struct Staged<S> {
    live: S,
    pending: Option<S>,
}

impl<S> Staged<S> {
    pub(crate) fn new(live: S) -> Self {
        Self { live, pending: None }
    }

    pub(crate) fn stage(&mut self, settings: S) {
        self.pending = Some(settings);
    }

    /// Promote the staged settings. Returns true when something changed.
    pub(crate) fn commit(&mut self) -> bool {
        match self.pending.take() {
            Some(next) => {
                self.live = next;
                true
            }
            None => false,
        }
    }

    pub(crate) fn live(&self) -> &S {
        &self.live
    }

    pub(crate) fn latest(&self) -> &S {
        self.pending.as_ref().unwrap_or(&self.live)
    }
}

/// Replace a non-finite value with `fallback`
pub(crate) fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

pub(crate) fn finite_color_or(color: Color, fallback: Color) -> Color {
    if color.is_finite() {
        color
    } else {
        fallback
    }
}
