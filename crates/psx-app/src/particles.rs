// ABOUTME: Demo particle bursts: building groups and splatting live batches into the frame.
// ABOUTME: Particles drift outward over the burst lifetime at their own speed.

use std::time::Duration;

use nalgebra::{Matrix4, Vector3};
use rand::Rng;

use psx_core::Color;
use psx_particles::generators::{sizes, sphere_positions, time_multipliers};
use psx_particles::group::{POSITION, SIZE, TIME_MULTIPLIER};
use psx_particles::{
    particle_progress, Blending, Material, ParticleGroup, ParticleSettings, PointBatch,
};
use psx_post::Framebuffer;

use crate::scene::{Scene, CAMERA_FAR, CAMERA_NEAR};

pub const BURST_ID: &str = "demo";
pub const BURST_COUNT: usize = 100;
pub const BURST_DURATION: Duration = Duration::from_millis(2100);

/// A spherical shell of sparkles around the cube
pub fn burst<R: Rng + ?Sized>(rng: &mut R) -> ParticleGroup {
    ParticleGroup::new(BURST_ID, BURST_COUNT)
        .with_duration(BURST_DURATION)
        .with_attribute(POSITION, sphere_positions(rng, BURST_COUNT, 1.6, 0.5))
        .with_attribute(SIZE, sizes(rng, BURST_COUNT))
        .with_attribute(TIME_MULTIPLIER, time_multipliers(rng, BURST_COUNT))
        .with_material(Material::sparkle(0.08, Color::PARTICLE_GREEN))
        .with_settings(ParticleSettings {
            depth_write: false,
            blending: Blending::Additive,
            transparent: true,
        })
}

/// Draw `batch` as square points, `progress` being the burst's lifetime fraction
pub fn splat(fb: &mut Framebuffer, scene: &Scene, batch: &PointBatch, progress: f32) {
    let Some(positions) = batch.positions() else {
        return;
    };
    let transforms = scene.camera().transforms(Matrix4::identity());
    let color = batch.material.color();

    for i in 0..batch.count {
        let Some(p) = positions.item(i) else {
            break;
        };
        let multiplier = batch
            .attribute(TIME_MULTIPLIER)
            .and_then(|a| a.item(i))
            .map_or(1.0, |v| v[0]);
        let size = batch.attribute(SIZE).and_then(|a| a.item(i)).map_or(1.0, |v| v[0]);

        let t = particle_progress(progress, multiplier);
        let position = Vector3::new(p[0], p[1], p[2]) * (1.0 + t);
        let Some(v) = scene.project(&position, &transforms, fb) else {
            continue;
        };

        let view_depth = v.depth * (CAMERA_FAR - CAMERA_NEAR) + CAMERA_NEAR;
        let radius = (batch.material.point_size(size, fb.height as f32, view_depth) * 0.5).max(0.5);
        let fade = 1.0 - t;

        let (x0, x1) = ((v.x - radius).floor() as i64, (v.x + radius).ceil() as i64);
        let (y0, y1) = ((v.y - radius).floor() as i64, (v.y + radius).ceil() as i64);
        for y in y0..y1 {
            for x in x0..x1 {
                plot(fb, x, y, v.depth, color.scale_rgb(fade), batch);
            }
        }
    }
}

fn plot(fb: &mut Framebuffer, x: i64, y: i64, depth: f32, color: Color, batch: &PointBatch) {
    if x < 0 || y < 0 || x as usize >= fb.width || y as usize >= fb.height {
        return;
    }
    let i = y as usize * fb.width + x as usize;
    if depth >= fb.depth[i] {
        return;
    }
    let base = fb.color[i];
    fb.color[i] = match batch.settings.blending {
        Blending::None | Blending::Normal => color,
        Blending::Additive => Color::rgb(base.r + color.r, base.g + color.g, base.b + color.b),
        Blending::Subtractive => Color::rgb(base.r - color.r, base.g - color.g, base.b - color.b),
        Blending::Multiply => Color::rgb(base.r * color.r, base.g * color.g, base.b * color.b),
    };
    if batch.settings.depth_write {
        fb.depth[i] = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn burst_is_valid() {
        let group = burst(&mut StdRng::seed_from_u64(1));
        assert_eq!(group.validate(), Ok(()));
        assert_eq!(group.duration, Some(Duration::from_millis(2100)));
    }
}
