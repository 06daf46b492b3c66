use std::collections::HashSet;
use std::sync::Arc;

use crate::animation::ease::Ease;
use crate::animation::tween::{Channel, Timeline, TweenSpec, TweenUpdate};
use crate::assets::pool::ImagePool;
use crate::foundation::core::{ImageId, Millis, PointerSample, Size};
use crate::foundation::error::{RecolorError, TrailError, TrailResult};
use crate::foundation::math::Rng64;
use crate::recolor::cache::{RecolorCache, RecolorKey, RecolorTicket};
use crate::recolor::transform::TransformParams;
use crate::render::backend::SceneItem;
use crate::trail::config::TrailConfig;
use crate::trail::pointer::PointerSampler;
use crate::trail::slot::{IntroMotion, OverlayFilter, SlotState, TrailSlot, pick_variant};

/// Filter a slot keeps once its recolor transition has completed.
const RECOLORED_FILTER: OverlayFilter = OverlayFilter {
    contrast: 1.0,
    hue_rotate_deg: 0.0,
    saturate: 1.15,
};

/// Counters of controller decisions since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrailStats {
    /// Slots placed.
    pub spawns: u64,
    /// Slots returned to idle (faded out or force-completed).
    pub retires: u64,
    /// Recolor requests issued to the cache.
    pub recolors_started: u64,
    /// Recolor cross-fades that reached progress 1.
    pub recolors_completed: u64,
    /// Recolor requests that resolved to an error.
    pub recolor_failures: u64,
    /// Recolor results dropped because their slot no longer wanted them.
    pub stale_discards: u64,
}

#[derive(Debug)]
struct PendingRecolor {
    slot: usize,
    generation: u64,
    ticket: RecolorTicket,
}

/// Owner of the slot ring. Decides spawns, recolors and retires once per frame.
///
/// The controller is single-threaded: the host feeds pointer samples through
/// [`TrailController::observe`] and calls [`TrailController::tick`] once per frame. The only
/// work that leaves the frame path is the pixel transform, which the shared [`RecolorCache`]
/// schedules on its executor and the controller polls.
pub struct TrailController {
    config: TrailConfig,
    params: TransformParams,
    enabled: bool,
    capacity: usize,

    slots: Vec<TrailSlot>,
    cursor: usize,
    live: usize,
    z_counter: u32,
    generation: u64,
    rng: Rng64,

    sampler: PointerSampler,
    timeline: Timeline,
    cache: Arc<RecolorCache>,

    excluded: HashSet<ImageId>,
    failed: HashSet<RecolorKey>,
    pending: Option<PendingRecolor>,
    debounce_due: Option<Millis>,
    last_initiation: Option<Millis>,

    stats: TrailStats,
    shut_down: bool,
}

impl TrailController {
    /// One slot per pool image; slot `i` always shows `ImageId(i)`.
    pub fn new(config: TrailConfig, pool: &ImagePool, cache: Arc<RecolorCache>) -> TrailResult<Self> {
        config.validate()?;
        if pool.is_empty() {
            return Err(TrailError::validation("image pool must not be empty"));
        }
        let slots: Vec<TrailSlot> = pool.iter().map(|img| TrailSlot::new(img.clone())).collect();
        let capacity = config.effective_capacity(slots.len());
        if capacity < config.visible_capacity {
            tracing::warn!(
                requested = config.visible_capacity,
                effective = capacity,
                pool = slots.len(),
                "visible capacity clamped to pool size"
            );
        }

        Ok(Self {
            params: config.recolor_params(),
            enabled: config.enabled,
            capacity,
            cursor: slots.len() - 1,
            live: 0,
            z_counter: 0,
            generation: 0,
            rng: Rng64::new(config.seed),
            sampler: PointerSampler::new(config.smoothing),
            timeline: Timeline::new(),
            cache,
            excluded: HashSet::new(),
            failed: HashSet::new(),
            pending: None,
            debounce_due: None,
            last_initiation: None,
            stats: TrailStats::default(),
            shut_down: false,
            slots,
            config,
        })
    }

    /// Apply one pointer sample. Samples must arrive in order.
    pub fn observe(&mut self, sample: PointerSample) {
        if self.shut_down {
            return;
        }
        self.sampler.observe(sample);
    }

    /// Run one frame: smoothing, spawn gate, recolor gate, then tween progress.
    pub fn tick(&mut self, now: Millis) {
        if self.shut_down {
            return;
        }
        self.sampler.tick();
        self.spawn_gate(now);
        self.recolor_gate(now);
        self.advance_tweens(now);
    }

    /// Change the duotone parameters for future recolors and toggle recoloring.
    ///
    /// Slots already recolored keep their overlay while recoloring stays enabled. Disabling drops
    /// the pending request and the debounce timer and resets every recolored slot.
    pub fn update_recolor(&mut self, params: TransformParams, enabled: bool) -> TrailResult<()> {
        params.validate()?;
        self.params = params;
        self.enabled = enabled;
        if enabled {
            return Ok(());
        }

        if let Some(p) = self.pending.take() {
            tracing::debug!(slot = p.slot, "recolor disabled, pending request dropped");
        }
        self.debounce_due = None;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.state == SlotState::Recoloring || slot.recolored || slot.overlay.is_some() {
                self.timeline.cancel(idx, Channel::Recolor);
                slot.reset_recolor();
                if slot.state == SlotState::Recoloring {
                    slot.state = SlotState::Visible;
                }
            }
        }
        Ok(())
    }

    /// Cancel every tween, the debounce timer and the pending request. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let cancelled = self.timeline.clear();
        self.debounce_due = None;
        self.pending = None;
        self.shut_down = true;
        tracing::debug!(cancelled, "trail controller shut down");
    }

    /// Live slots in paint order (lowest z first).
    pub fn scene(&self) -> Vec<SceneItem> {
        let mut items: Vec<SceneItem> = self
            .slots
            .iter()
            .filter(|s| s.is_live())
            .map(SceneItem::from_slot)
            .collect();
        items.sort_by_key(|it| it.z_order);
        items
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    /// Parameters used for the next recolor request.
    pub fn params(&self) -> &TransformParams {
        &self.params
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Effective visible capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slots(&self) -> &[TrailSlot] {
        &self.slots
    }

    /// Number of non-idle slots.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Slot index of the most recent spawn (the ring cursor).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sampler(&self) -> &PointerSampler {
        &self.sampler
    }

    pub fn stats(&self) -> TrailStats {
        self.stats
    }

    /// Slot waiting on the cache, if any.
    pub fn pending_recolor(&self) -> Option<usize> {
        self.pending.as_ref().map(|p| p.slot)
    }

    /// Time the deferred recolor check fires, if one is scheduled.
    pub fn debounce_due(&self) -> Option<Millis> {
        self.debounce_due
    }

    /// Whether `image` is excluded from recoloring because its source never loaded.
    pub fn is_excluded(&self, image: ImageId) -> bool {
        self.excluded.contains(&image)
    }

    /// Whether recoloring `image` under the current parameters already failed.
    pub fn has_failed(&self, image: ImageId) -> bool {
        self.excluded.contains(&image) || self.failed.contains(&self.key_for(image))
    }

    /// Number of running tweens.
    pub fn active_tweens(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn spawn_gate(&mut self, now: Millis) {
        if !self.sampler.is_primed() {
            return;
        }
        if self.sampler.distance_since_last_spawn() <= self.config.spawn_threshold_px {
            return;
        }
        if let Some(elapsed) = self.sampler.since_last_spawn(now)
            && elapsed <= self.config.spawn_cooldown_ms
        {
            return;
        }
        self.spawn(now);
    }

    fn spawn(&mut self, now: Millis) {
        let n = self.slots.len();
        let idx = (self.cursor + 1) % n;

        if self.slots[idx].is_live() {
            self.release(idx);
        }
        if self.live + 1 > self.capacity
            && let Some(oldest) = self.oldest_live()
        {
            self.release(oldest);
        }

        self.cursor = idx;
        self.generation += 1;
        self.z_counter += 1;

        let variant = pick_variant(self.rng.next_u64(), &self.config.size_variants);
        let max_rot = self.config.max_rotation_deg;
        let rotation = if max_rot > 0.0 {
            self.rng.range_f64(-max_rot, max_rot)
        } else {
            0.0
        };
        let intro = IntroMotion {
            from_center: self.sampler.smoothed(),
            to_center: self.sampler.raw(),
            from_scale: self.config.intro_start_scale,
            to_rotation_deg: rotation,
        };

        let slot = &mut self.slots[idx];
        slot.reset_recolor();
        slot.state = SlotState::Spawning;
        slot.generation = self.generation;
        slot.size = Size::new(variant.width, variant.height);
        slot.opacity = 1.0;
        slot.z_order = self.z_counter;
        slot.intro = Some(intro);
        slot.apply_intro(0.0);
        slot.tweens.intro = Some(self.timeline.start(
            idx,
            Channel::Intro,
            TweenSpec::progress(self.config.intro_duration_ms, Ease::OutCubic),
            now,
        ));
        slot.state = SlotState::Visible;

        self.live += 1;
        self.stats.spawns += 1;
        self.sampler.mark_spawn(now);
        tracing::debug!(
            slot = idx,
            z = self.z_counter,
            x = intro.from_center.x,
            y = intro.from_center.y,
            live = self.live,
            "spawn"
        );

        self.request_recolor(now);
        self.enforce_capacity(idx, now);
    }

    /// Start retiring the oldest non-newest slot once the non-retiring slots fill the capacity,
    /// so the next spawn always has room.
    fn enforce_capacity(&mut self, newest: usize, now: Millis) {
        let standing = self
            .slots
            .iter()
            .filter(|s| s.is_live() && s.state != SlotState::Retiring)
            .count();
        if standing < self.capacity {
            return;
        }
        let Some(idx) = self
            .ring_back()
            .find(|&i| i != newest && matches!(self.slots[i].state, SlotState::Visible | SlotState::Recoloring))
        else {
            return;
        };
        self.retire(idx, now);
    }

    fn retire(&mut self, idx: usize, now: Millis) {
        self.timeline.cancel(idx, Channel::Recolor);
        let slot = &mut self.slots[idx];
        slot.tweens.recolor = None;
        slot.state = SlotState::Retiring;
        slot.tweens.retire = Some(self.timeline.start(
            idx,
            Channel::Retire,
            TweenSpec {
                from: slot.opacity,
                to: 0.0,
                duration_ms: self.config.retire_duration_ms,
                ease: Ease::OutQuart,
            },
            now,
        ));
        tracing::debug!(slot = idx, "retire");
    }

    /// Return a slot to idle immediately, cancelling everything tied to it.
    fn release(&mut self, idx: usize) {
        self.timeline.cancel_target(idx);
        let slot = &mut self.slots[idx];
        if !slot.is_live() {
            return;
        }
        slot.deactivate();
        self.live -= 1;
        self.stats.retires += 1;
        if self.live == 0 {
            self.z_counter = 0;
        }
        tracing::debug!(slot = idx, live = self.live, "slot idle");
    }

    /// Slot indices from oldest to newest spawn, by ring distance behind the cursor.
    fn ring_back(&self) -> impl Iterator<Item = usize> + use<> {
        let n = self.slots.len();
        let cursor = self.cursor;
        (0..n).rev().map(move |off| (cursor + n - off) % n)
    }

    fn oldest_live(&self) -> Option<usize> {
        self.ring_back().find(|&i| self.slots[i].is_live())
    }

    fn recolor_gate(&mut self, now: Millis) {
        if let Some(due) = self.debounce_due
            && now >= due
        {
            self.debounce_due = None;
            self.request_recolor(now);
        }
        self.poll_pending(now);
    }

    /// Debounced recolor initiation. At most one request is ever in flight.
    fn request_recolor(&mut self, now: Millis) {
        if !self.enabled || self.shut_down {
            return;
        }
        let visible = self
            .slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Visible | SlotState::Recoloring))
            .count();
        if visible < 2 {
            return;
        }
        if let Some(last) = self.last_initiation {
            let due = last.after(self.config.recolor_debounce_ms);
            if now < due {
                self.debounce_due = Some(due);
                return;
            }
        }
        if self.pending.is_some() || self.slots.iter().any(|s| s.state == SlotState::Recoloring) {
            return;
        }
        let Some(idx) = self.recolor_target() else {
            return;
        };

        let slot = &mut self.slots[idx];
        let ticket = self.cache.request(slot.image(), &self.params);
        slot.state = SlotState::Recoloring;
        slot.recolor_progress = 0.0;
        self.pending = Some(PendingRecolor {
            slot: idx,
            generation: slot.generation,
            ticket,
        });
        self.last_initiation = Some(now);
        self.debounce_due = None;
        self.stats.recolors_started += 1;
        tracing::debug!(slot = idx, image = %slot.image_id(), "recolor requested");
    }

    /// Oldest visible slot, other than the newest, that is not recolored and has not failed.
    fn recolor_target(&self) -> Option<usize> {
        self.ring_back().filter(|&i| i != self.cursor).find(|&i| {
            let s = &self.slots[i];
            s.state == SlotState::Visible && !s.recolored && !self.has_failed(s.image_id())
        })
    }

    fn key_for(&self, image: ImageId) -> RecolorKey {
        RecolorKey {
            image,
            params: self.params,
        }
    }

    fn poll_pending(&mut self, now: Millis) {
        let Some(outcome) = self.pending.as_ref().and_then(|p| p.ticket.try_get()) else {
            return;
        };
        let Some(p) = self.pending.take() else {
            return;
        };
        let idx = p.slot;
        let slot = &mut self.slots[idx];
        let relevant = self.enabled
            && slot.generation == p.generation
            && slot.state == SlotState::Recoloring;

        if !relevant {
            self.stats.stale_discards += 1;
            tracing::debug!(slot = idx, "discarding recolor result for a slot that moved on");
            self.request_recolor(now);
            return;
        }

        match outcome {
            Ok(visual) => {
                slot.overlay = Some(visual);
                slot.apply_recolor(0.0);
                let duration = Millis::from_secs_f64(self.params.duration_secs).0;
                slot.tweens.recolor = Some(self.timeline.start(
                    idx,
                    Channel::Recolor,
                    TweenSpec::progress(duration, Ease::InOutQuad),
                    now,
                ));
            }
            Err(err) => {
                let image = slot.image_id();
                slot.state = SlotState::Visible;
                slot.reset_recolor();
                // Only a missing source bans the image; other failures are per parameter set.
                if matches!(err, RecolorError::ResourceLoad { .. }) {
                    self.excluded.insert(image);
                } else {
                    self.failed.insert(p.ticket.key());
                }
                self.stats.recolor_failures += 1;
                tracing::warn!(slot = idx, %image, error = %err, "recolor failed; keeping original");
                self.request_recolor(now);
            }
        }
    }

    fn advance_tweens(&mut self, now: Millis) {
        let updates = self.timeline.advance(now);
        let mut recolor_finished = false;
        for u in updates {
            match u.channel {
                Channel::Intro => self.apply_intro(u),
                Channel::Recolor => recolor_finished |= self.apply_recolor(u),
                Channel::Retire => self.apply_retire(u),
            }
        }
        if recolor_finished {
            self.request_recolor(now);
        }
    }

    fn apply_intro(&mut self, u: TweenUpdate) {
        let slot = &mut self.slots[u.target];
        if slot.tweens.intro != Some(u.id) {
            return;
        }
        slot.apply_intro(u.value);
        if u.completed {
            slot.intro = None;
            slot.tweens.intro = None;
        }
    }

    fn apply_recolor(&mut self, u: TweenUpdate) -> bool {
        let slot = &mut self.slots[u.target];
        if slot.tweens.recolor != Some(u.id) || slot.state != SlotState::Recoloring {
            return false;
        }
        slot.apply_recolor(u.value);
        if !u.completed {
            return false;
        }
        slot.recolor_progress = 1.0;
        slot.recolored = true;
        slot.filter = RECOLORED_FILTER;
        slot.tweens.recolor = None;
        slot.state = SlotState::Visible;
        self.stats.recolors_completed += 1;
        tracing::debug!(slot = u.target, "recolor complete");
        true
    }

    fn apply_retire(&mut self, u: TweenUpdate) {
        let slot = &mut self.slots[u.target];
        if slot.tweens.retire != Some(u.id) {
            return;
        }
        slot.opacity = u.value;
        if u.completed {
            self.release(u.target);
        }
    }
}

impl Drop for TrailController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/trail/controller.rs"]
mod tests;
