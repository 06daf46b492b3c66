/// Small deterministic generator (SplitMix64) used for variant and rotation picks.
#[derive(Clone, Copy, Debug)]
pub struct Rng64 {
    state: u64,
}

impl Rng64 {
    /// Seed the generator.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        // SplitMix64
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f64_01(&mut self) -> f64 {
        // 53 bits of precision.
        let v = self.next_u64() >> 11;
        (v as f64) * (1.0 / ((1u64 << 53) as f64))
    }

    /// Uniform value in `[lo, hi)`.
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64_01()
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        ((self.next_f64_01() * len as f64) as usize).min(len.saturating_sub(1))
    }
}

/// Integer lattice hash mapped to `[0, 1]`.
///
/// Pure function of `(x, y)`: the same coordinates always produce the same value, which keeps the
/// duotone dither stable between runs and between tiles of the same image.
pub fn lattice_noise01(x: u32, y: u32) -> f64 {
    let mut n = (x as i32).wrapping_add((y as i32).wrapping_mul(57));
    n = (n << 13) ^ n;
    let h = n
        .wrapping_mul(
            n.wrapping_mul(n)
                .wrapping_mul(15_731)
                .wrapping_add(789_221),
        )
        .wrapping_add(1_376_312_589);
    f64::from(h & 0x7fff_ffff) / f64::from(0x7fff_ffff)
}

/// Linear interpolation, `t = 0` yields `a`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    (1.0 - t) * a + t * b
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
