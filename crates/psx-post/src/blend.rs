// ABOUTME: Blend functions combining a stage's output with the color it received.
// ABOUTME: Mirrors the usual compositor blend modes, mixed by an opacity.

use psx_core::{BlendFunction, Color};

fn channel(function: BlendFunction, base: f32, blend: f32) -> f32 {
    match function {
        BlendFunction::Skip => base,
        BlendFunction::Normal => blend,
        BlendFunction::Add => base + blend,
        BlendFunction::Subtract => base - blend,
        BlendFunction::Multiply => base * blend,
        BlendFunction::Screen => 1.0 - (1.0 - base) * (1.0 - blend),
        BlendFunction::Darken => base.min(blend),
        BlendFunction::Lighten => base.max(blend),
        BlendFunction::Overlay => {
            if base < 0.5 {
                2.0 * base * blend
            } else {
                1.0 - 2.0 * (1.0 - base) * (1.0 - blend)
            }
        }
    }
}

/// Combine `output` over `input`, then mix the result back toward `input` by `opacity`
pub fn blend(function: BlendFunction, input: Color, output: Color, opacity: f32) -> Color {
    if function == BlendFunction::Skip {
        return input;
    }
    let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
    let mixed = Color::rgba(
        channel(function, input.r, output.r),
        channel(function, input.g, output.g),
        channel(function, input.b, output.b),
        // Alpha follows the normal rule for every mode
        output.a,
    );
    input.lerp(mixed, opacity)
}
