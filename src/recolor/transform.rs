//! Duotone pixel pipeline.
//!
//! Per pixel: Rec.601 luminance, gamma-style intensity curve, deterministic lattice dither, then a
//! linear blend between two target colors. Alpha passes through untouched.

use std::hash::{Hash, Hasher};

use rayon::prelude::*;

use crate::assets::pool::PixelBuffer;
use crate::foundation::core::Rgb8;
use crate::foundation::error::{TrailError, TrailResult};
use crate::foundation::math::lattice_noise01;

/// Parameters of one duotone rendition. Used (hashed) as part of the recolor cache key.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TransformParams {
    /// Color for luminance 0.
    pub color_a: Rgb8,
    /// Color for luminance 1.
    pub color_b: Rgb8,
    /// Curve exponent divisor; `> 1` lifts toward midtones, `< 1` deepens contrast.
    pub intensity: f64,
    /// Dither amplitude in `[0, 1)`.
    pub noise_amount: f64,
    /// Length of the on-screen cross-fade, in seconds.
    pub duration_secs: f64,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            color_a: Rgb8::new(234, 218, 179),
            color_b: Rgb8::new(229, 5, 206),
            intensity: 1.0,
            noise_amount: 0.1,
            duration_secs: 2.0,
        }
    }
}

impl TransformParams {
    /// Reject values the pipeline cannot honor.
    pub fn validate(&self) -> TrailResult<()> {
        if !self.intensity.is_finite() || self.intensity <= 0.0 {
            return Err(TrailError::validation("intensity must be finite and > 0"));
        }
        if !(0.0..1.0).contains(&self.noise_amount) {
            return Err(TrailError::validation("noise_amount must be in [0, 1)"));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(TrailError::validation(
                "recolor duration must be finite and > 0",
            ));
        }
        Ok(())
    }

    /// Stable 64-bit digest of every field.
    pub fn params_hash(&self) -> u64 {
        let mut bytes = [0u8; 30];
        bytes[0..3].copy_from_slice(&self.color_a.channels());
        bytes[3..6].copy_from_slice(&self.color_b.channels());
        bytes[6..14].copy_from_slice(&self.intensity.to_bits().to_le_bytes());
        bytes[14..22].copy_from_slice(&self.noise_amount.to_bits().to_le_bytes());
        bytes[22..30].copy_from_slice(&self.duration_secs.to_bits().to_le_bytes());
        xxhash_rust::xxh3::xxh3_64(&bytes)
    }
}

// Bitwise float equality keeps `Eq` and `Hash` consistent for cache keys.
impl PartialEq for TransformParams {
    fn eq(&self, other: &Self) -> bool {
        self.color_a == other.color_a
            && self.color_b == other.color_b
            && self.intensity.to_bits() == other.intensity.to_bits()
            && self.noise_amount.to_bits() == other.noise_amount.to_bits()
            && self.duration_secs.to_bits() == other.duration_secs.to_bits()
    }
}

impl Eq for TransformParams {}

impl Hash for TransformParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.params_hash());
    }
}

/// Recolor a raw RGBA8 buffer of `width x height` pixels.
///
/// Pure and deterministic: identical inputs always produce byte-identical output. Rows are processed
/// in parallel on the current rayon pool.
#[tracing::instrument(skip(pixels, params))]
pub fn transform(
    pixels: &[u8],
    width: u32,
    height: u32,
    params: &TransformParams,
) -> TrailResult<Vec<u8>> {
    params.validate()?;
    let row_bytes = (width as usize).saturating_mul(4);
    let expected = row_bytes.saturating_mul(height as usize);
    if pixels.len() != expected {
        return Err(TrailError::transform(format!(
            "rgba8 buffer has {} bytes, expected {expected} for {width}x{height}",
            pixels.len()
        )));
    }

    let mut out = pixels.to_vec();
    if expected == 0 {
        return Ok(out);
    }

    let kernel = Kernel::new(params);
    out.par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                kernel.apply(px, x as u32, y as u32);
            }
        });
    Ok(out)
}

/// [`transform`] over an owned image type.
pub fn transform_image(src: &PixelBuffer, params: &TransformParams) -> TrailResult<PixelBuffer> {
    let (w, h) = src.dimensions();
    let out = transform(src.as_raw(), w, h, params)?;
    PixelBuffer::from_raw(w, h, out)
        .ok_or_else(|| TrailError::transform("output buffer does not match image dimensions"))
}

struct Kernel {
    a: [f64; 3],
    b: [f64; 3],
    inv_intensity: f64,
    noise: f64,
}

impl Kernel {
    fn new(p: &TransformParams) -> Self {
        let f = |c: Rgb8| c.channels().map(f64::from);
        Self {
            a: f(p.color_a),
            b: f(p.color_b),
            inv_intensity: 1.0 / p.intensity,
            noise: p.noise_amount,
        }
    }

    #[inline]
    fn apply(&self, px: &mut [u8], x: u32, y: u32) {
        let lum = (0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2]))
            / 255.0;
        let adjusted = if self.inv_intensity == 1.0 {
            lum
        } else {
            lum.powf(self.inv_intensity)
        };
        let n = (lattice_noise01(x, y) - 0.5) * 2.0 * self.noise;
        let t = (adjusted + n).clamp(0.0, 1.0);
        for c in 0..3 {
            px[c] = (self.a[c] * (1.0 - t) + self.b[c] * t)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recolor/transform.rs"]
mod tests;
