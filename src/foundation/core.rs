pub use kurbo::{Affine, Point, Rect, Size, Vec2};

/// Monotonic timestamp in whole milliseconds since an arbitrary session origin.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Millis(pub u64);

impl Millis {
    /// Session origin.
    pub const ZERO: Self = Self(0);

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn since(self, earlier: Millis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Timestamp `ms` milliseconds after `self`.
    pub fn after(self, ms: u64) -> Millis {
        Millis(self.0.saturating_add(ms))
    }

    /// Convert seconds (as used by durations in configuration) to whole milliseconds.
    pub fn from_secs_f64(secs: f64) -> Millis {
        Millis((secs.max(0.0) * 1000.0).round() as u64)
    }
}

/// Stable identity of one pool image (its index in the pool).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ImageId(pub usize);

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque 8-bit sRGB color without alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Construct from channel values.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array, in `r, g, b` order.
    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl std::fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// One pointer-move event in surface-local coordinates.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointerSample {
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels.
    pub y: f64,
    /// Arrival time.
    #[serde(rename = "t_ms")]
    pub at: Millis,
}

impl PointerSample {
    /// Construct a sample.
    pub fn new(x: f64, y: f64, at: Millis) -> Self {
        Self { x, y, at }
    }

    /// Position as a point.
    pub fn point(self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
