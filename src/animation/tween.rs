use smallvec::SmallVec;

use crate::animation::ease::Ease;
use crate::foundation::core::Millis;

/// Which property family of a slot a tween drives.
///
/// A target has at most one running tween per channel; starting a new one replaces the old.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Spawn motion (scale, rotation, drift from smoothed to raw pointer).
    Intro,
    /// Duotone cross-fade progress.
    Recolor,
    /// Fade-out opacity.
    Retire,
}

/// Identity of one started tween. Never reused within a [`Timeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TweenId(pub u64);

/// Scalar tween description: `from -> to` over `duration_ms` with `ease`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TweenSpec {
    /// Value at progress 0.
    pub from: f64,
    /// Value at progress 1.
    pub to: f64,
    /// Duration; zero completes on the first advance.
    pub duration_ms: u64,
    /// Curve applied to normalized progress.
    pub ease: Ease,
}

impl TweenSpec {
    /// Normalized `0 -> 1` progress tween.
    pub fn progress(duration_ms: u64, ease: Ease) -> Self {
        Self {
            from: 0.0,
            to: 1.0,
            duration_ms,
            ease,
        }
    }

    fn value_at(&self, linear: f64) -> f64 {
        let e = self.ease.apply(linear);
        self.from + (self.to - self.from) * e
    }
}

/// Per-advance notification for one tween.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TweenUpdate {
    /// Tween identity; receivers compare it against the id they stored at start time.
    pub id: TweenId,
    /// Opaque target index (slot index for the trail controller).
    pub target: usize,
    /// Channel of the tween.
    pub channel: Channel,
    /// Eased value.
    pub value: f64,
    /// Linear progress in `[0, 1]`.
    pub progress: f64,
    /// `true` exactly once, on the advance that reached the end. The tween is gone afterwards.
    pub completed: bool,
}

#[derive(Clone, Debug)]
struct Tween {
    id: TweenId,
    target: usize,
    channel: Channel,
    spec: TweenSpec,
    start: Millis,
}

/// Time-driven scalar tween set.
///
/// Tweens never call back into their owner. Instead [`Timeline::advance`] returns update events in
/// start order, and the owner applies them. Cancelling is synchronous: a cancelled tween produces no
/// further updates.
#[derive(Debug, Default)]
pub struct Timeline {
    tweens: Vec<Tween>,
    next_id: u64,
}

impl Timeline {
    /// Empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a tween at `now`, replacing any running tween on the same `(target, channel)`.
    pub fn start(&mut self, target: usize, channel: Channel, spec: TweenSpec, now: Millis) -> TweenId {
        self.cancel(target, channel);
        let id = TweenId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.tweens.push(Tween {
            id,
            target,
            channel,
            spec,
            start: now,
        });
        id
    }

    /// Cancel the tween on `(target, channel)`, returning its id if one was running.
    pub fn cancel(&mut self, target: usize, channel: Channel) -> Option<TweenId> {
        let pos = self
            .tweens
            .iter()
            .position(|t| t.target == target && t.channel == channel)?;
        Some(self.tweens.remove(pos).id)
    }

    /// Cancel every tween of `target`. Returns how many were removed.
    pub fn cancel_target(&mut self, target: usize) -> usize {
        let before = self.tweens.len();
        self.tweens.retain(|t| t.target != target);
        before - self.tweens.len()
    }

    /// Cancel everything. Returns how many tweens were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.tweens.len();
        self.tweens.clear();
        n
    }

    /// Whether `(target, channel)` currently has a running tween.
    pub fn is_active(&self, target: usize, channel: Channel) -> bool {
        self.tweens
            .iter()
            .any(|t| t.target == target && t.channel == channel)
    }

    /// Number of running tweens.
    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    /// `true` when nothing is running.
    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    /// Sample every running tween at `now`; completed tweens are removed.
    pub fn advance(&mut self, now: Millis) -> SmallVec<[TweenUpdate; 8]> {
        let mut out = SmallVec::new();
        self.tweens.retain(|t| {
            let elapsed = now.since(t.start);
            let progress = if t.spec.duration_ms == 0 {
                1.0
            } else {
                (elapsed as f64 / t.spec.duration_ms as f64).min(1.0)
            };
            let completed = progress >= 1.0;
            out.push(TweenUpdate {
                id: t.id,
                target: t.target,
                channel: t.channel,
                value: if completed {
                    t.spec.to
                } else {
                    t.spec.value_at(progress)
                },
                progress,
                completed,
            });
            !completed
        });
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/tween.rs"]
mod tests;
