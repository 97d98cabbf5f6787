// ABOUTME: Random attribute buffers for particle bursts.
// ABOUTME: Callers pass the RNG so seeded runs are reproducible.

use std::f32::consts::{PI, TAU};

use rand::Rng;

use crate::group::Attribute;

/// Positions uniformly inside the unit cube centered on the origin
pub fn cube_positions<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Attribute {
    let mut data: Vec<f32> = Vec::with_capacity(count * 3);
    for _ in 0..count {
        data.push(rng.gen_range(-0.5..0.5));
        data.push(rng.gen_range(-0.5..0.5));
        data.push(rng.gen_range(-0.5..0.5));
    }
    Attribute::new(data, 3)
}

/// Positions in a spherical shell between `radius * radius_range` and `radius`
pub fn sphere_positions<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    radius: f32,
    radius_range: f32,
) -> Attribute {
    let radius_range = radius_range.clamp(0.0, 1.0);
    let mut data: Vec<f32> = Vec::with_capacity(count * 3);
    for _ in 0..count {
        let r = radius * (radius_range + rng.gen::<f32>() * (1.0 - radius_range));
        let phi = rng.gen::<f32>() * PI;
        let theta = rng.gen::<f32>() * TAU;
        // Y-up spherical coordinates
        data.push(r * phi.sin() * theta.sin());
        data.push(r * phi.cos());
        data.push(r * phi.sin() * theta.cos());
    }
    Attribute::new(data, 3)
}

/// Per-particle size factors in `[0, 1)`
pub fn sizes<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Attribute {
    Attribute::new((0..count).map(|_| rng.gen::<f32>()).collect(), 1)
}

/// Per-particle animation speed-ups in `[1, 2)`
pub fn time_multipliers<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Attribute {
    Attribute::new((0..count).map(|_| rng.gen_range(1.0..2.0)).collect(), 1)
}
