// ABOUTME: Ordered-dither threshold matrices and per-channel color reduction.
// ABOUTME: Pure math with no state; same inputs always give the same output.

use psx_core::DitherPattern;

/// Upper bound on quantization steps
pub const MAX_LEVELS: i32 = 256;

/// Rounding bias so a threshold of exactly 1.0 still rounds up at the top of a step
const THRESHOLD_SCALE: f32 = 0.999;

const BAYER_2X2: [f32; 4] = [0.0, 3.0 / 4.0, 2.0 / 4.0, 1.0 / 4.0];

#[rustfmt::skip]
const BAYER_4X4: [f32; 16] = [
    0.00, 0.50, 0.10, 0.65,
    0.75, 0.25, 0.90, 0.35,
    0.20, 0.70, 0.05, 0.50,
    0.95, 0.40, 0.80, 0.30,
];

#[rustfmt::skip]
const BAYER_8X8: [u8; 64] = [
     0, 32,  8, 40,  2, 34, 10, 42,
    48, 16, 56, 24, 50, 18, 58, 26,
    12, 44,  4, 36, 14, 46,  6, 38,
    60, 28, 52, 20, 62, 30, 54, 22,
     3, 35, 11, 43,  1, 33,  9, 41,
    51, 19, 59, 27, 49, 17, 57, 25,
    15, 47,  7, 39, 13, 45,  5, 37,
    63, 31, 55, 23, 61, 29, 53, 21,
];

#[rustfmt::skip]
const CLUSTER_8X8: [u8; 64] = [
    24, 10, 12, 26, 35, 47, 49, 37,
     8,  0,  2, 14, 45, 59, 61, 51,
    22,  6,  4, 16, 43, 57, 63, 53,
    30, 20, 18, 28, 33, 41, 55, 39,
    34, 46, 48, 36, 25, 11, 13, 27,
    44, 58, 60, 50,  9,  1,  3, 15,
    42, 56, 62, 52, 23,  7,  5, 17,
    32, 40, 54, 38, 31, 21, 19, 29,
];

/// Raw matrix entry for a cell index inside the tile
fn entry(pattern: DitherPattern, index: usize) -> f32 {
    match pattern {
        DitherPattern::Bayer2 => BAYER_2X2[index],
        DitherPattern::Bayer4 => BAYER_4X4[index],
        DitherPattern::Bayer8 => BAYER_8X8[index] as f32 / 64.0,
        DitherPattern::Cluster8 => CLUSTER_8X8[index] as f32 / 64.0,
    }
}

/// Threshold for an integer pixel coordinate. Tiles repeat every `pattern.size()` pixels.
pub fn threshold(pattern: DitherPattern, x: i64, y: i64) -> f32 {
    let n = pattern.size() as i64;
    let sx = x.rem_euclid(n);
    let sy = y.rem_euclid(n);
    // Column-major cell order
    entry(pattern, (sy + sx * n) as usize)
}

/// Threshold for a fragment coordinate such as a pixel center
pub fn threshold_at(pattern: DitherPattern, x: f32, y: f32) -> f32 {
    let fx = if x.is_finite() { x.floor() as i64 } else { 0 };
    let fy = if y.is_finite() { y.floor() as i64 } else { 0 };
    threshold(pattern, fx, fy)
}

/// Pull the raw matrix threshold toward `darkness`
pub fn biased_threshold(threshold: f32, darkness: f32) -> f32 {
    let darkness = if darkness.is_finite() { darkness } else { 0.0 };
    ((threshold - darkness) * threshold + darkness).clamp(0.0, 1.0)
}

/// Clamp a requested level count into `[1, MAX_LEVELS]`
pub fn clamp_levels(levels: i32) -> i32 {
    levels.clamp(1, MAX_LEVELS)
}

/// Snap `raw` to one of `levels + 1` evenly spaced values in `[0, 1]`.
///
/// A value lying between two steps rounds down when its position inside the
/// step is at most `threshold`, and up otherwise.
pub fn reduce(raw: f32, threshold: f32, levels: i32) -> f32 {
    let levels = clamp_levels(levels);
    let d = levels as f32;
    let step = 1.0 / d;
    let raw = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) };
    let threshold = if threshold.is_nan() { 0.0 } else { threshold };

    // Smallest step index i with raw <= step * (i + 1)
    let mut i = ((raw * d).ceil() as i32 - 1).clamp(0, levels - 1);
    while i > 0 && raw <= step * i as f32 {
        i -= 1;
    }
    while i < levels - 1 && raw > step * (i + 1) as f32 {
        i += 1;
    }

    let frac = raw * d - i as f32;
    let k = if frac <= threshold * THRESHOLD_SCALE { i } else { i + 1 };
    k as f32 / d
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn reduce_hits_exactly_levels_plus_one_values() {
        for levels in [1, 2, 3, 7, 15, 64, 255, 256] {
            let all: BTreeSet<u32> = (0..=levels)
                .map(|k| (k as f32 / levels as f32).to_bits())
                .collect();
            assert_eq!(all.len(), levels as usize + 1);
            for t in [0.0, 0.25, 0.5, 0.999, 1.0] {
                let mut seen = BTreeSet::new();
                let samples = 4096;
                for s in 0..=samples {
                    let raw = s as f32 / samples as f32;
                    let v = reduce(raw, t, levels);
                    assert!((0.0..=1.0).contains(&v));
                    let k = v * levels as f32;
                    assert!((k - k.round()).abs() < 1e-3, "{} is off-grid", v);
                    seen.insert(v.to_bits());
                }
                assert!(seen.len() <= levels as usize + 1);
                if levels <= 15 {
                    assert_eq!(seen, all, "levels {} t {}", levels, t);
                }
            }
        }
    }

    #[test]
    fn reduce_is_monotonic_in_raw() {
        for levels in [1, 4, 15, 100, 256] {
            for t in [0.0, 0.3, 0.7, 1.0] {
                let mut prev = -1.0;
                for s in 0..=10_000 {
                    let raw = s as f32 / 10_000.0;
                    let v = reduce(raw, t, levels);
                    assert!(v >= prev, "levels {} t {} raw {}", levels, t, raw);
                    prev = v;
                }
            }
        }
    }

    #[test]
    fn reduce_endpoints() {
        assert_eq!(reduce(0.0, 0.5, 15), 0.0);
        assert_eq!(reduce(1.0, 0.5, 15), 1.0);
        assert_eq!(reduce(1.0, 1.0, 15), 1.0);
    }

    #[test]
    fn threshold_decides_rounding() {
        // 0.5 sits halfway into the first step of a 1-level reduction
        assert_eq!(reduce(0.5, 0.9, 1), 0.0);
        assert_eq!(reduce(0.5, 0.1, 1), 1.0);
    }

    #[test]
    fn levels_are_clamped() {
        assert_eq!(reduce(0.4, 0.5, 0), reduce(0.4, 0.5, 1));
        assert_eq!(reduce(0.4, 0.5, -10), reduce(0.4, 0.5, 1));
        assert_eq!(reduce(0.4, 0.5, 10_000), reduce(0.4, 0.5, MAX_LEVELS));
    }

    #[test]
    fn reduce_handles_garbage_input() {
        assert_eq!(reduce(f32::NAN, 0.5, 8), 0.0);
        assert_eq!(reduce(3.0, 0.5, 8), 1.0);
        assert_eq!(reduce(-1.0, 0.5, 8), 0.0);
        assert!(reduce(0.3, f32::NAN, 8).is_finite());
    }

    #[test]
    fn thresholds_tile_with_pattern_size() {
        for &pattern in DitherPattern::all() {
            let n = pattern.size() as i64;
            for y in -20..20 {
                for x in -20..20 {
                    let t = threshold(pattern, x, y);
                    assert_eq!(t, threshold(pattern, x + n, y));
                    assert_eq!(t, threshold(pattern, x, y + n));
                    assert_eq!(t, threshold(pattern, x, y));
                    assert!((0.0..1.0).contains(&t));
                }
            }
        }
    }

    #[test]
    fn bayer4_has_period_four_not_two() {
        let differs = (0..4).any(|x| {
            (0..4).any(|y| {
                threshold(DitherPattern::Bayer4, x, y) != threshold(DitherPattern::Bayer4, x + 2, y)
            })
        });
        assert!(differs);
    }

    #[test]
    fn fragment_coordinates_are_floored() {
        assert_eq!(
            threshold_at(DitherPattern::Bayer8, 3.5, 6.9),
            threshold(DitherPattern::Bayer8, 3, 6)
        );
        assert_eq!(
            threshold_at(DitherPattern::Bayer2, -0.5, 0.5),
            threshold(DitherPattern::Bayer2, -1, 0)
        );
    }

    #[test]
    fn column_major_lookup() {
        // Second entry of the table lives at x = 0, y = 1
        assert_eq!(threshold(DitherPattern::Bayer2, 0, 1), 0.75);
        assert_eq!(threshold(DitherPattern::Bayer2, 1, 0), 0.5);
    }

    #[test]
    fn eight_by_eight_tables_cover_every_rank() {
        for table in [&BAYER_8X8, &CLUSTER_8X8] {
            let ranks: BTreeSet<u8> = table.iter().copied().collect();
            assert_eq!(ranks.len(), 64);
        }
    }

    #[test]
    fn bias_stays_in_unit_range() {
        for t in [0.0, 0.25, 0.5, 1.0] {
            for d in [-1.0, 0.0, 0.2, 1.0, f32::NAN] {
                let b = biased_threshold(t, d);
                assert!((0.0..=1.0).contains(&b));
            }
        }
    }
}
