use crate::foundation::core::{Millis, Point, PointerSample};

/// Raw and smoothed pointer position plus the spawn bookkeeping the trail gate reads.
///
/// Smoothing is per frame, not time-scaled: every [`PointerSampler::tick`] moves the smoothed
/// position `smoothing` of the remaining way toward the raw one.
#[derive(Clone, Debug)]
pub struct PointerSampler {
    raw: Point,
    smoothed: Point,
    smoothing: f64,
    primed: bool,
    last_sample_at: Option<Millis>,
    last_spawn_at: Option<Millis>,
    last_spawn_pos: Point,
}

impl PointerSampler {
    /// Sampler with the given per-frame smoothing factor in `(0, 1]`.
    pub fn new(smoothing: f64) -> Self {
        Self {
            raw: Point::ORIGIN,
            smoothed: Point::ORIGIN,
            smoothing: smoothing.clamp(f64::MIN_POSITIVE, 1.0),
            primed: false,
            last_sample_at: None,
            last_spawn_at: None,
            last_spawn_pos: Point::ORIGIN,
        }
    }

    /// Apply one pointer sample. The first sample also seeds the smoothed position.
    pub fn observe(&mut self, sample: PointerSample) {
        self.raw = sample.point();
        self.last_sample_at = Some(sample.at);
        if !self.primed {
            self.smoothed = self.raw;
            self.primed = true;
        }
    }

    /// Advance smoothing by one frame. No-op until the first sample arrives.
    pub fn tick(&mut self) {
        if !self.primed {
            return;
        }
        let t = self.smoothing;
        self.smoothed = self.smoothed.lerp(self.raw, t);
    }

    /// Whether any sample has been observed.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Latest raw position.
    pub fn raw(&self) -> Point {
        self.raw
    }

    /// Smoothed position.
    pub fn smoothed(&self) -> Point {
        self.smoothed
    }

    /// Time of the latest sample.
    pub fn last_sample_at(&self) -> Option<Millis> {
        self.last_sample_at
    }

    /// Euclidean distance between the raw position and the position recorded at the last spawn.
    ///
    /// Before the first spawn the reference position is the surface origin.
    pub fn distance_since_last_spawn(&self) -> f64 {
        self.raw.distance(self.last_spawn_pos)
    }

    /// Milliseconds since the last spawn, `None` before the first one.
    pub fn since_last_spawn(&self, now: Millis) -> Option<u64> {
        self.last_spawn_at.map(|at| now.since(at))
    }

    /// Record a spawn at the current raw position.
    pub fn mark_spawn(&mut self, now: Millis) {
        self.last_spawn_at = Some(now);
        self.last_spawn_pos = self.raw;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/trail/pointer.rs"]
mod tests;
