//! Placeholder frame generation for when no engine can run.
//!
//! The gradient is a pure function of (width, height, time code) so repeated
//! requests — and cached copies — are bit-identical. The palette animates
//! with the time code, which keeps frame sequences visibly alive even in
//! fallback mode.

use crate::frame::Frame;

/// Hard ceiling on either dimension, independent of any configured
/// `max_texture_size`; the generator must never allocate unboundedly.
const MAX_DIMENSION: u32 = 8192;

/// Produces the deterministic placeholder gradient. Total: every input maps
/// to some frame, with out-of-range dimensions clamped rather than refused.
pub fn generate(width: u32, height: u32, time_code: f32) -> Frame {
    let clamped_w = width.clamp(1, MAX_DIMENSION);
    let clamped_h = height.clamp(1, MAX_DIMENSION);
    if clamped_w != width || clamped_h != height {
        tracing::warn!(
            width,
            height,
            max = MAX_DIMENSION,
            "clamping fallback frame dimensions"
        );
    }
    let time_code = if time_code.is_finite() { time_code } else { 0.0 };

    let mut pixels = Vec::with_capacity(clamped_w as usize * clamped_h as usize * 4);
    for y in 0..clamped_h {
        let fy = unit_coordinate(y, clamped_h);
        for x in 0..clamped_w {
            let fx = unit_coordinate(x, clamped_w);
            let r = (fx * 10.0 + time_code * 2.0).sin() * 0.5 + 0.5;
            let g = (fy * 8.0 + time_code * 1.5).cos() * 0.5 + 0.5;
            let b = ((fx + fy) * 5.0 + time_code * 3.0).sin() * 0.5 + 0.5;
            pixels.push((r * 255.0) as u8);
            pixels.push((g * 255.0) as u8);
            pixels.push((b * 255.0) as u8);
            pixels.push(255);
        }
    }
    Frame::from_parts(clamped_w, clamped_h, pixels)
}

/// Maps a pixel index onto [0, 1] inclusive of both ends, matching an
/// evenly spaced gradient across the axis.
fn unit_coordinate(index: u32, extent: u32) -> f32 {
    if extent <= 1 {
        0.0
    } else {
        index as f32 / (extent - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_arguments_produce_identical_pixels() {
        let a = generate(64, 48, 1.25);
        let b = generate(64, 48, 1.25);
        assert_eq!(a.pixels(), b.pixels());
    }

    #[test]
    fn time_code_animates_the_gradient() {
        let a = generate(32, 32, 0.0);
        let b = generate(32, 32, 2.0);
        assert_ne!(a.pixels(), b.pixels());
    }

    #[test]
    fn zero_and_oversized_dimensions_are_clamped() {
        let tiny = generate(0, 0, 0.0);
        assert_eq!((tiny.width(), tiny.height()), (1, 1));

        let huge = generate(u32::MAX, 16, 0.0);
        assert_eq!(huge.width(), MAX_DIMENSION);
        assert_eq!(huge.height(), 16);
    }

    #[test]
    fn non_finite_time_codes_do_not_panic() {
        let frame = generate(8, 8, f32::NAN);
        assert_eq!(frame.pixels().len(), 8 * 8 * 4);
    }
}
