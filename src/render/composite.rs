use crate::trail::slot::OverlayFilter;

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Premultiplied float color in `[0, 1]` to bytes.
pub fn quantize(px: [f32; 4]) -> PremulRgba8 {
    px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Straight-alpha bytes to premultiplied floats.
pub fn premultiply(px: [u8; 4]) -> [f32; 4] {
    let a = f32::from(px[3]) / 255.0;
    [
        f32::from(px[0]) / 255.0 * a,
        f32::from(px[1]) / 255.0 * a,
        f32::from(px[2]) / 255.0 * a,
        a,
    ]
}

/// CSS `contrast() hue-rotate() saturate()` chain as one affine color transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterMatrix {
    contrast: f32,
    m: [[f32; 3]; 3],
}

impl FilterMatrix {
    pub fn new(filter: &OverlayFilter) -> Self {
        let hue = hue_rotate(filter.hue_rotate_deg as f32);
        let sat = saturate(filter.saturate as f32);
        Self {
            contrast: filter.contrast as f32,
            m: mat_mul(&sat, &hue),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::new(&OverlayFilter::IDENTITY)
    }

    /// Apply to a premultiplied color.
    pub fn apply(&self, px: [f32; 4]) -> [f32; 4] {
        let a = px[3];
        if a <= 0.0 {
            return px;
        }
        let c = [px[0] / a, px[1] / a, px[2] / a].map(|v| (v - 0.5) * self.contrast + 0.5);
        let c = c.map(|v| v.clamp(0.0, 1.0));
        let mut out = [0.0f32; 4];
        for (row, o) in self.m.iter().zip(out.iter_mut()) {
            *o = (row[0] * c[0] + row[1] * c[1] + row[2] * c[2]).clamp(0.0, 1.0) * a;
        }
        out[3] = a;
        out
    }
}

fn hue_rotate(deg: f32) -> [[f32; 3]; 3] {
    let (s, c) = deg.to_radians().sin_cos();
    [
        [
            0.213 + c * 0.787 - s * 0.213,
            0.715 - c * 0.715 - s * 0.715,
            0.072 - c * 0.072 + s * 0.928,
        ],
        [
            0.213 - c * 0.213 + s * 0.143,
            0.715 + c * 0.285 + s * 0.140,
            0.072 - c * 0.072 - s * 0.283,
        ],
        [
            0.213 - c * 0.213 - s * 0.787,
            0.715 - c * 0.715 + s * 0.715,
            0.072 + c * 0.928 + s * 0.072,
        ],
    ]
}

fn saturate(s: f32) -> [[f32; 3]; 3] {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn mat_mul(a: &[[f32; 3]; 3], b: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0f32; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}
