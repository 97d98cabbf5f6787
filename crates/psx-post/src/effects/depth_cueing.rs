// ABOUTME: Depth cueing stage: fades pixels toward a fog color by scene depth.
// ABOUTME: Needs the depth buffer; without it the stage is inert.

use bytemuck::{Pod, Zeroable};

use psx_core::{BlendFunction, Color, DepthCueingSettings, EffectConfig};

use super::{finite_color_or, finite_or, Effect, Staged};
use crate::framebuffer::Fragment;
use crate::pipeline::FrameState;

const MIN_SPAN: f32 = 1e-3;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FogUniforms {
    pub fog_color: [f32; 4],
    pub near: f32,
    pub far: f32,
    pub density: f32,
    /// Depth span raised to the near plane, precomputed once per frame
    pub total_depth: f32,
}

impl FogUniforms {
    pub fn from_settings(settings: &DepthCueingSettings) -> Self {
        let defaults = DepthCueingSettings::default();
        let near = finite_or(settings.camera_near, defaults.camera_near)
            - finite_or(settings.near_offset, 0.0);
        let far = finite_or(settings.camera_far, defaults.camera_far)
            - finite_or(settings.far_offset, 0.0);

        let span = (far - near).max(MIN_SPAN);
        let mut total_depth = span.powf(near);
        if !total_depth.is_finite() || total_depth < MIN_SPAN {
            tracing::warn!(
                "Degenerate fog planes near={} far={}, falling back to a linear ramp",
                near,
                far
            );
            total_depth = 1.0;
        }

        Self {
            fog_color: finite_color_or(settings.fog_color, defaults.fog_color).to_array(),
            near,
            far,
            density: finite_or(settings.fog_density, defaults.fog_density).max(0.0),
            total_depth,
        }
    }
}

/// Fog amount in `[0, 1]` for a linear depth in `[0, 1]`; grows with depth
pub fn fog_factor(depth: f32, uniforms: &FogUniforms) -> f32 {
    let total = uniforms.total_depth;
    let d = depth.clamp(0.0, 1.0);
    let scaled = total - d * total;
    let shift = (1.0 - scaled).clamp(0.0, 1.0) / total;
    (shift * uniforms.density).clamp(0.0, 1.0)
}

pub struct DepthCueingEffect {
    settings: Staged<DepthCueingSettings>,
    uniforms: FogUniforms,
}

impl DepthCueingEffect {
    pub fn new(settings: DepthCueingSettings) -> Self {
        let uniforms = FogUniforms::from_settings(&settings);
        Self {
            settings: Staged::new(settings),
            uniforms,
        }
    }

    pub fn set_settings(&mut self, settings: DepthCueingSettings) {
        self.settings.stage(settings);
    }

    pub fn uniforms(&self) -> &FogUniforms {
        &self.uniforms
    }
}

impl Effect for DepthCueingEffect {
    fn name(&self) -> &'static str {
        "depth_cueing"
    }

    fn requires_depth(&self) -> bool {
        true
    }

    fn blend(&self) -> BlendFunction {
        self.settings.live().blend
    }

    fn update(&mut self, _frame: &FrameState) {
        if self.settings.commit() {
            tracing::debug!("Depth cueing settings updated: {:?}", self.settings.live());
            self.uniforms = FogUniforms::from_settings(self.settings.live());
        }
    }

    fn shade(&self, input: Color, fragment: &Fragment) -> Color {
        match fragment.depth {
            Some(depth) if !depth.is_nan() => {
                let alpha = fog_factor(depth, &self.uniforms);
                input.lerp(Color::from_array(self.uniforms.fog_color), alpha)
            }
            _ => input,
        }
    }

    fn uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }

    fn set_config(&mut self, config: EffectConfig) -> Result<(), EffectConfig> {
        match config {
            EffectConfig::DepthCueing(settings) => {
                self.set_settings(settings);
                Ok(())
            }
            other => Err(other),
        }
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::DepthCueing(self.settings.latest().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(depth: Option<f32>) -> Fragment {
        Fragment {
            uv: [0.5, 0.5],
            coord: [0, 0],
            depth,
        }
    }

    #[test]
    fn factor_is_monotone_in_depth() {
        let u = FogUniforms::from_settings(&DepthCueingSettings {
            near_offset: 0.04,
            fog_density: 0.8,
            ..Default::default()
        });
        let mut prev = -1.0;
        for i in 0..=100 {
            let f = fog_factor(i as f32 / 100.0, &u);
            assert!(f >= prev);
            assert!((0.0..=1.0).contains(&f));
            prev = f;
        }
        assert!(fog_factor(1.0, &u) > fog_factor(0.0, &u));
    }

    #[test]
    fn zero_density_is_clear() {
        let u = FogUniforms::from_settings(&DepthCueingSettings {
            fog_density: 0.0,
            ..Default::default()
        });
        assert_eq!(fog_factor(1.0, &u), 0.0);
    }

    #[test]
    fn no_depth_passes_through() {
        let fog = DepthCueingEffect::new(DepthCueingSettings::default());
        let input = Color::rgba(0.2, 0.4, 0.6, 0.8);
        assert_eq!(fog.shade(input, &fragment(None)), input);
        assert_eq!(fog.shade(input, &fragment(Some(f32::NAN))), input);
    }

    #[test]
    fn far_pixels_move_toward_fog_color() {
        let fog = DepthCueingEffect::new(DepthCueingSettings {
            fog_color: Color::WHITE,
            fog_density: 1.0,
            ..Default::default()
        });
        let near = fog.shade(Color::BLACK, &fragment(Some(0.0)));
        let far = fog.shade(Color::BLACK, &fragment(Some(1.0)));
        assert!(far.r > near.r);
    }

    #[test]
    fn degenerate_planes_stay_finite() {
        let planes = [
            (5.0, 1.0, 0.0),
            (0.0, 0.0, 0.0),
            (-3.0, 1e30, 2.0),
            (f32::NAN, 20.0, 0.0),
        ];
        for (near, far, offset) in planes {
            let u = FogUniforms::from_settings(&DepthCueingSettings {
                camera_near: near,
                camera_far: far,
                near_offset: offset,
                ..Default::default()
            });
            assert!(u.total_depth.is_finite() && u.total_depth > 0.0);
            for d in [0.0, 0.5, 1.0] {
                assert!(fog_factor(d, &u).is_finite());
            }
        }
    }
}
