// ABOUTME: CRT monitor stage: barrel curvature, bezel, vignette and rolling scanlines.
// ABOUTME: Out-of-screen pixels get the bezel color; the rest is attenuated per axis.

use bytemuck::{Pod, Zeroable};
use std::f32::consts::TAU;

use psx_core::{BlendFunction, Color, CrtSettings, EffectConfig};

use super::{finite_color_or, finite_or, Effect, Staged};
use crate::framebuffer::Fragment;
use crate::pipeline::FrameState;

/// Smallest curvature magnitude; smaller values would blow the remap up
pub const MIN_CURVATURE: f32 = 0.1;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CrtUniforms {
    pub curvature: [f32; 2],
    pub scanline_resolution: [f32; 2],
    pub border_color: [f32; 4],
    pub time: f32,
    pub scanline_speed: f32,
    pub scanline_opacity: f32,
    pub vignette_opacity: f32,
    pub gamma: f32,
    _pad: [f32; 3],
}

impl CrtUniforms {
    /// Sanitised snapshot of `settings` at `time`
    pub fn from_settings(settings: &CrtSettings, time: f32) -> Self {
        let defaults = CrtSettings::default();
        let curvature_axis = |v: f32, d: f32| {
            if v.is_nan() {
                d
            } else {
                v.abs().max(MIN_CURVATURE)
            }
        };
        let resolution_axis = |v: f32, d: f32| finite_or(v, d).abs();

        Self {
            curvature: [
                curvature_axis(settings.curvature[0], defaults.curvature[0]),
                curvature_axis(settings.curvature[1], defaults.curvature[1]),
            ],
            scanline_resolution: [
                resolution_axis(settings.scanline_resolution[0], defaults.scanline_resolution[0]),
                resolution_axis(settings.scanline_resolution[1], defaults.scanline_resolution[1]),
            ],
            border_color: finite_color_or(settings.border_color, defaults.border_color).to_array(),
            time: finite_or(time, 0.0),
            scanline_speed: finite_or(settings.scanline_speed, 0.0),
            scanline_opacity: finite_or(settings.scanline_opacity, defaults.scanline_opacity)
                .max(0.0),
            vignette_opacity: finite_or(settings.vignette_opacity, defaults.vignette_opacity)
                .max(0.0),
            gamma: finite_or(settings.gamma, defaults.gamma).max(0.0),
            _pad: [0.0; 3],
        }
    }
}

/// Barrel distortion of a screen uv. Larger curvature means a flatter screen.
pub fn curve_remap(uv: [f32; 2], curvature: [f32; 2]) -> [f32; 2] {
    let x = uv[0] * 2.0 - 1.0;
    let y = uv[1] * 2.0 - 1.0;
    let off_x = y.abs() / curvature[0];
    let off_y = x.abs() / curvature[1];
    let x = x + x * off_x * off_x;
    let y = y + y * off_y * off_y;
    [x * 0.5 + 0.5, y * 0.5 + 0.5]
}

/// Brightness of one scanline axis at `phase`, in `[0.1, 1]` before the exponent
pub fn scanline_intensity(phase: f32, resolution: f32, opacity: f32) -> f32 {
    let wave = (phase * resolution * TAU).sin();
    let intensity = (0.5 * wave + 0.5) * 0.9 + 0.1;
    intensity.powf(opacity)
}

/// Darkening toward the screen edges
pub fn vignette_intensity(uv: [f32; 2], resolution_x: f32, opacity: f32) -> f32 {
    let [x, y] = uv;
    let intensity = x * y * (1.0 - x) * (1.0 - y);
    ((resolution_x / 4.0) * intensity)
        .max(0.0)
        .powf(opacity)
        .clamp(0.0, 1.0)
}

pub struct CrtEffect {
    settings: Staged<CrtSettings>,
    uniforms: CrtUniforms,
}

impl CrtEffect {
    pub fn new(settings: CrtSettings) -> Self {
        let uniforms = CrtUniforms::from_settings(&settings, 0.0);
        Self {
            settings: Staged::new(settings),
            uniforms,
        }
    }

    pub fn set_settings(&mut self, settings: CrtSettings) {
        self.settings.stage(settings);
    }

    pub fn uniforms(&self) -> &CrtUniforms {
        &self.uniforms
    }
}

impl Effect for CrtEffect {
    fn name(&self) -> &'static str {
        "crt"
    }

    fn requires_depth(&self) -> bool {
        self.settings.live().requires_depth
    }

    fn blend(&self) -> BlendFunction {
        self.settings.live().blend
    }

    fn update(&mut self, frame: &FrameState) {
        if self.settings.commit() {
            tracing::debug!("CRT settings updated: {:?}", self.settings.live());
        }
        self.uniforms = CrtUniforms::from_settings(self.settings.live(), frame.time);
    }

    fn shade(&self, input: Color, fragment: &Fragment) -> Color {
        let u = &self.uniforms;
        let uv = curve_remap(fragment.uv, u.curvature);

        if uv[0] < 0.0 || uv[1] < 0.0 || uv[0] > 1.0 || uv[1] > 1.0 {
            return Color::from_array(u.border_color);
        }

        let scroll = u.time * u.scanline_speed;
        let vignette = vignette_intensity(uv, u.scanline_resolution[0], u.vignette_opacity);
        let scan_x = scanline_intensity(
            uv[0] + scroll,
            u.scanline_resolution[0],
            u.scanline_opacity,
        );
        let scan_y = scanline_intensity(
            uv[1] + scroll,
            u.scanline_resolution[1],
            u.scanline_opacity,
        );

        input.scale_rgb(vignette * scan_x * scan_y * u.gamma)
    }

    fn uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }

    fn set_config(&mut self, config: EffectConfig) -> Result<(), EffectConfig> {
        match config {
            EffectConfig::Crt(settings) => {
                self.set_settings(settings);
                Ok(())
            }
            other => Err(other),
        }
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Crt(self.settings.latest().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(time: f32) -> FrameState {
        FrameState {
            time,
            delta: 0.0,
            frame: 1,
        }
    }

    fn fragment(u: f32, v: f32) -> Fragment {
        Fragment {
            uv: [u, v],
            coord: [0, 0],
            depth: Some(0.5),
        }
    }

    #[test]
    fn center_is_not_distorted() {
        assert_eq!(curve_remap([0.5, 0.5], [5.5, 5.5]), [0.5, 0.5]);
    }

    #[test]
    fn corners_bulge_outward() {
        let [x, y] = curve_remap([0.99, 0.99], [5.5, 5.5]);
        assert!(x > 1.0 && y > 1.0);
    }

    #[test]
    fn outside_screen_is_border_color_exactly() {
        let border = Color::rgba(0.1, 0.2, 0.3, 0.4);
        let mut crt = CrtEffect::new(CrtSettings {
            border_color: border,
            curvature: [2.0, 2.0],
            ..Default::default()
        });
        crt.update(&frame(12.5));

        for input in [Color::WHITE, Color::BLACK, Color::rgba(0.3, 0.9, 0.1, 0.0)] {
            for (u, v) in [(0.0, 0.0), (1.0, 0.5), (0.02, 0.98), (0.999, 0.001)] {
                let uv = curve_remap([u, v], [2.0, 2.0]);
                if uv.iter().any(|c| !(0.0..=1.0).contains(c)) {
                    assert_eq!(crt.shade(input, &fragment(u, v)), border);
                }
            }
        }
    }

    #[test]
    fn zero_curvature_is_clamped() {
        let mut crt = CrtEffect::new(CrtSettings {
            curvature: [0.0, f32::NAN],
            ..Default::default()
        });
        crt.update(&frame(0.0));
        assert_eq!(crt.uniforms().curvature, [MIN_CURVATURE, 5.5]);

        for u in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let c = crt.shade(Color::gray(0.5), &fragment(u, 0.5));
            assert!(c.is_finite());
        }
    }

    #[test]
    fn garbage_settings_never_produce_nan() {
        let mut crt = CrtEffect::new(CrtSettings {
            scanline_opacity: f32::INFINITY,
            vignette_opacity: f32::NAN,
            gamma: f32::NEG_INFINITY,
            scanline_speed: f32::NAN,
            scanline_resolution: [f32::NAN, f32::INFINITY],
            border_color: Color::rgba(f32::NAN, 0.0, 0.0, 1.0),
            ..Default::default()
        });
        crt.update(&frame(3.0));
        for u in [0.1, 0.5, 0.9] {
            for v in [0.1, 0.5, 0.9] {
                assert!(crt.shade(Color::gray(0.5), &fragment(u, v)).is_finite());
            }
        }
        assert!(crt.shade(Color::WHITE, &fragment(0.0, 0.0)).is_finite());
    }

    #[test]
    fn scanline_range() {
        for i in 0..100 {
            let s = scanline_intensity(i as f32 / 100.0, 10.0, 1.0);
            assert!((0.1 - 1e-6..=1.0 + 1e-6).contains(&s));
        }
        assert_eq!(scanline_intensity(0.3, 10.0, 0.0), 1.0);
    }

    #[test]
    fn vignette_peaks_in_center() {
        let center = vignette_intensity([0.5, 0.5], 1024.0, 0.5);
        let edge = vignette_intensity([0.01, 0.5], 4.0, 0.5);
        assert_relative_eq!(center, 1.0);
        assert!(edge < center);
        assert_eq!(vignette_intensity([0.0, 0.3], 1024.0, 0.5), 0.0);
    }

    #[test]
    fn gamma_is_independent_of_scanline_opacity() {
        let base = CrtSettings {
            scanline_opacity: 0.0,
            vignette_opacity: 0.0,
            gamma: 0.5,
            ..Default::default()
        };
        let mut crt = CrtEffect::new(base.clone());
        crt.update(&frame(0.0));
        let c = crt.shade(Color::WHITE, &fragment(0.5, 0.5));
        assert_relative_eq!(c.r, 0.5);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn settings_apply_on_next_update() {
        let mut crt = CrtEffect::new(CrtSettings::default());
        crt.update(&frame(0.0));
        crt.set_settings(CrtSettings {
            gamma: 0.25,
            ..Default::default()
        });
        assert_eq!(crt.uniforms().gamma, 0.9);
        crt.update(&frame(0.016));
        assert_eq!(crt.uniforms().gamma, 0.25);
    }

    #[test]
    fn uniform_block_is_sixteen_byte_aligned() {
        let crt = CrtEffect::new(CrtSettings::default());
        assert_eq!(crt.uniform_bytes().len() % 16, 0);
    }
}
