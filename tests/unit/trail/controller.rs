use super::*;
use crate::assets::pool::PoolImage;
use crate::recolor::cache::{DeferredExecutor, Job, RecolorExecutor};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicBool, Ordering};

struct Rig {
    ctl: TrailController,
    exec: Arc<DeferredExecutor>,
    cache: Arc<RecolorCache>,
}

fn px(i: usize) -> RgbaImage {
    RgbaImage::from_pixel(4, 4, Rgba([(i * 40) as u8, 100, 200, 255]))
}

fn cfg() -> TrailConfig {
    TrailConfig {
        intro_duration_ms: 100,
        retire_duration_ms: 100,
        recolor_duration_secs: 0.5,
        smoothing: 1.0,
        ..TrailConfig::default()
    }
}

fn rig_with(pool: ImagePool, cfg: TrailConfig) -> Rig {
    let exec = Arc::new(DeferredExecutor::new());
    let cache = Arc::new(RecolorCache::new(exec.clone()));
    let ctl = TrailController::new(cfg, &pool, cache.clone()).unwrap();
    Rig { ctl, exec, cache }
}

fn rig(n: usize, cfg: TrailConfig) -> Rig {
    rig_with(ImagePool::from_pixels((0..n).map(px).collect()).unwrap(), cfg)
}

impl Rig {
    fn move_to(&mut self, x: f64, y: f64, t: u64) {
        self.ctl.observe(PointerSample::new(x, y, Millis(t)));
        self.ctl.tick(Millis(t));
    }

    fn state(&self, i: usize) -> SlotState {
        self.ctl.slots()[i].state()
    }

    fn non_idle(&self) -> usize {
        self.ctl.slots().iter().filter(|s| s.is_live()).count()
    }
}

#[test]
fn rejects_invalid_config() {
    let pool = ImagePool::from_pixels(vec![px(0)]).unwrap();
    let exec = Arc::new(DeferredExecutor::new());
    let cache = Arc::new(RecolorCache::new(exec));
    let bad = TrailConfig {
        visible_capacity: 0,
        ..TrailConfig::default()
    };
    assert!(TrailController::new(bad, &pool, cache).is_err());
}

#[test]
fn spawn_needs_distance_and_cooldown() {
    let mut r = rig(4, cfg());

    r.move_to(50.0, 50.0, 0);
    assert_eq!(r.ctl.stats().spawns, 0, "70px from origin is below threshold");

    r.move_to(250.0, 0.0, 10);
    assert_eq!(r.ctl.stats().spawns, 1);

    // 250px away but only 100ms later: cooldown blocks.
    r.move_to(500.0, 0.0, 110);
    assert_eq!(r.ctl.stats().spawns, 1);
    r.move_to(500.0, 0.0, 250);
    assert_eq!(r.ctl.stats().spawns, 1);

    r.move_to(500.0, 0.0, 320);
    assert_eq!(r.ctl.stats().spawns, 2);

    // Cooldown met but only 150px travelled.
    r.move_to(650.0, 0.0, 1000);
    assert_eq!(r.ctl.stats().spawns, 2);
}

#[test]
fn spawn_advances_ring_cursor_and_z_order() {
    let mut r = rig(5, cfg());
    for k in 0..3u64 {
        r.move_to(250.0 * (k + 1) as f64, 0.0, k * 400);
    }
    assert_eq!(r.ctl.cursor(), 2);

    let scene = r.ctl.scene();
    let z: Vec<u32> = scene.iter().map(|it| it.z_order).collect();
    assert_eq!(z, vec![1, 2, 3]);
    assert_eq!(scene.last().map(|it| it.image), Some(ImageId(2)));
}

#[test]
fn spawn_starts_at_smoothed_position_and_settles_on_raw() {
    let mut r = rig(
        4,
        TrailConfig {
            smoothing: 0.3,
            ..TrailConfig::default()
        },
    );
    r.move_to(100.0, 0.0, 0);
    assert_eq!(r.ctl.stats().spawns, 0);

    r.move_to(400.0, 0.0, 16);
    assert_eq!(r.ctl.stats().spawns, 1);
    let s = &r.ctl.slots()[0];
    assert!((s.center().x - 190.0).abs() < 1e-9);
    assert!((s.scale() - 0.8).abs() < 1e-12);
    assert_eq!(s.rotation_deg(), 0.0);

    r.ctl.tick(Millis(16 + 800));
    let s = &r.ctl.slots()[0];
    assert!((s.center().x - 400.0).abs() < 1e-9);
    assert!((s.scale() - 1.0).abs() < 1e-12);
    assert!(s.rotation_deg().abs() <= 2.0);
    assert!(!r.ctl.timeline.is_active(0, Channel::Intro));
}

#[test]
fn non_idle_slots_never_exceed_capacity() {
    for retire_ms in [100, 800] {
        let mut r = rig(
            5,
            TrailConfig {
                retire_duration_ms: retire_ms,
                ..cfg()
            },
        );
        let mut t = 0;
        for k in 0..24 {
            let x = if k % 2 == 0 { 100.0 } else { 400.0 };
            let y = 50.0 * (k % 5) as f64;
            r.move_to(x, y, t);
            assert!(r.non_idle() <= 3, "k={k}: {} live", r.non_idle());
            assert_eq!(r.non_idle(), r.ctl.live_count());
            r.ctl.tick(Millis(t + 200));
            assert!(r.non_idle() <= 3);
            t += 350;
        }
        assert!(r.ctl.stats().spawns >= 20);
        assert!(r.ctl.stats().retires > 0);
    }
}

#[test]
fn capacity_one_reuses_and_resets_z() {
    let mut r = rig(
        3,
        TrailConfig {
            visible_capacity: 1,
            ..cfg()
        },
    );
    r.move_to(250.0, 0.0, 0);
    r.move_to(500.0, 0.0, 400);
    assert_eq!(r.state(0), SlotState::Idle);
    assert_eq!(r.state(1), SlotState::Visible);
    assert_eq!(r.ctl.slots()[1].z_order(), 1);
    assert_eq!(r.ctl.live_count(), 1);
}

#[test]
fn second_visible_slot_triggers_recolor_of_the_older_one() {
    let mut r = rig(4, cfg());
    r.move_to(250.0, 0.0, 0);
    assert_eq!(r.ctl.pending_recolor(), None, "a lone slot is never recolored");

    r.move_to(500.0, 0.0, 400);
    assert_eq!(r.ctl.pending_recolor(), Some(0));
    assert_eq!(r.state(0), SlotState::Recoloring);
    assert_eq!(r.exec.pending(), 1);

    assert_eq!(r.exec.run_pending(), 1);
    r.ctl.tick(Millis(416));
    assert_eq!(r.ctl.pending_recolor(), None);
    assert!(r.ctl.slots()[0].overlay().is_some());
    assert_eq!(r.ctl.slots()[0].recolor_progress(), 0.0);

    r.ctl.tick(Millis(666));
    let p = r.ctl.slots()[0].recolor_progress();
    assert!((p - 0.5).abs() < 1e-9, "{p}");
    assert!(r.ctl.slots()[0].filter().contrast > 1.0);

    r.ctl.tick(Millis(916));
    let s = &r.ctl.slots()[0];
    assert_eq!(s.state(), SlotState::Visible);
    assert!(s.is_recolored());
    assert_eq!(s.recolor_progress(), 1.0);
    assert_eq!(s.filter().saturate, 1.15);

    let stats = r.ctl.stats();
    assert_eq!(stats.recolors_started, 1);
    assert_eq!(stats.recolors_completed, 1);
    assert_eq!(r.cache.computations(), 1);
}

#[test]
fn debounce_coalesces_checks_into_one_deferred_initiation() {
    let mut r = rig(
        6,
        TrailConfig {
            visible_capacity: 4,
            enabled: false,
            recolor_duration_secs: 0.01,
            ..cfg()
        },
    );
    for k in 0..3u64 {
        r.move_to(250.0 * (k + 1) as f64, 0.0, k * 400);
    }
    assert_eq!(r.ctl.stats().recolors_started, 0);

    let params = *r.ctl.params();
    r.ctl.update_recolor(params, true).unwrap();
    r.ctl.request_recolor(Millis(2000));
    assert_eq!(r.ctl.stats().recolors_started, 1);
    assert_eq!(r.ctl.pending_recolor(), Some(0));

    r.exec.run_pending();
    r.ctl.tick(Millis(2010));
    r.ctl.tick(Millis(2030));
    assert!(r.ctl.slots()[0].is_recolored());

    for t in [2050, 2100, 2150] {
        r.ctl.request_recolor(Millis(t));
        assert_eq!(r.ctl.debounce_due(), Some(Millis(2200)));
    }
    r.ctl.tick(Millis(2199));
    assert_eq!(r.ctl.stats().recolors_started, 1);

    r.ctl.tick(Millis(2200));
    assert_eq!(r.ctl.stats().recolors_started, 2);
    assert_eq!(r.ctl.pending_recolor(), Some(1));
    assert_eq!(r.ctl.last_initiation, Some(Millis(2200)));
    assert_eq!(r.ctl.debounce_due(), None);
}

#[test]
fn retiring_a_recoloring_slot_cancels_the_transition() {
    let mut r = rig(5, cfg());
    r.move_to(250.0, 0.0, 0);
    r.move_to(500.0, 0.0, 400);
    r.exec.run_pending();
    r.ctl.tick(Millis(410));
    r.ctl.tick(Millis(600));
    assert_eq!(r.state(0), SlotState::Recoloring);
    assert!(r.ctl.slots()[0].recolor_progress() > 0.0);

    r.move_to(750.0, 0.0, 800);
    assert_eq!(r.state(0), SlotState::Retiring);
    assert!(!r.ctl.timeline.is_active(0, Channel::Recolor));

    r.ctl.tick(Millis(900));
    let s = &r.ctl.slots()[0];
    assert_eq!(s.state(), SlotState::Idle);
    assert_eq!(s.recolor_progress(), 0.0);
    assert!(s.overlay().is_none());
    assert!(!s.is_recolored());

    r.ctl.tick(Millis(3000));
    assert_eq!(r.state(0), SlotState::Idle);
    assert_eq!(r.ctl.slots()[0].recolor_progress(), 0.0);
    assert_eq!(r.ctl.stats().recolors_completed, 0);
}

#[test]
fn disabled_recolor_never_enters_recoloring() {
    let mut r = rig(
        5,
        TrailConfig {
            enabled: false,
            ..cfg()
        },
    );
    let mut t = 0;
    for k in 0..30 {
        let x = if k % 2 == 0 { 0.0 } else { 300.0 };
        r.move_to(x, 10.0 * k as f64, t);
        r.ctl.tick(Millis(t + 120));
        assert!(
            r.ctl
                .slots()
                .iter()
                .all(|s| s.state() != SlotState::Recoloring)
        );
        t += 400;
    }
    assert!(r.ctl.stats().spawns > 20);
    assert_eq!(r.ctl.stats().recolors_started, 0);
    assert_eq!(r.exec.pending(), 0);
    assert!(r.cache.is_empty());
}

#[test]
fn failed_image_is_excluded_and_trail_keeps_going() {
    let mut entries = vec![PoolImage::failed(ImageId(0), "missing.png", "no such file")];
    entries.extend((1..5).map(|i| PoolImage::loaded(ImageId(i), format!("img{i}"), px(i))));
    let mut r = rig_with(ImagePool::from_entries(entries).unwrap(), cfg());

    r.move_to(250.0, 0.0, 0);
    r.move_to(500.0, 0.0, 400);
    assert_eq!(r.ctl.stats().recolor_failures, 1);
    assert!(r.ctl.is_excluded(ImageId(0)));
    assert_eq!(r.state(0), SlotState::Visible);
    assert!(!r.ctl.slots()[0].is_recolored());
    assert_eq!(r.ctl.debounce_due(), Some(Millis(600)));

    r.move_to(750.0, 0.0, 800);
    assert_eq!(r.ctl.stats().spawns, 3);
    assert_eq!(r.ctl.pending_recolor(), Some(1));
    assert_eq!(r.cache.computations(), 1);
}

/// Drops every job while armed, so the cache publishes `Abandoned`.
struct DropWhileArmed {
    armed: AtomicBool,
    inner: DeferredExecutor,
}

impl RecolorExecutor for DropWhileArmed {
    fn spawn(&self, job: Job) {
        if !self.armed.load(Ordering::SeqCst) {
            self.inner.spawn(job);
        }
    }
}

#[test]
fn failure_blocks_only_its_parameter_set() {
    let exec = Arc::new(DropWhileArmed {
        armed: AtomicBool::new(true),
        inner: DeferredExecutor::new(),
    });
    let cache = Arc::new(RecolorCache::new(exec.clone()));
    let pool = ImagePool::from_pixels((0..5).map(px).collect()).unwrap();
    let mut ctl = TrailController::new(cfg(), &pool, cache.clone()).unwrap();

    for (x, t) in [(250.0, 0), (500.0, 400)] {
        ctl.observe(PointerSample::new(x, 0.0, Millis(t)));
        ctl.tick(Millis(t));
    }
    assert_eq!(ctl.stats().recolor_failures, 1);
    assert!(ctl.has_failed(ImageId(0)));
    assert!(!ctl.is_excluded(ImageId(0)));
    assert_eq!(ctl.slots()[0].state(), SlotState::Visible);

    // Same parameters: the debounced retry finds nothing to do.
    ctl.tick(Millis(600));
    assert_eq!(ctl.pending_recolor(), None);
    assert_eq!(ctl.stats().recolors_started, 1);

    exec.armed.store(false, Ordering::SeqCst);
    let params = TransformParams {
        noise_amount: 0.0,
        ..*ctl.params()
    };
    ctl.update_recolor(params, true).unwrap();
    assert!(!ctl.has_failed(ImageId(0)));

    ctl.request_recolor(Millis(700));
    assert_eq!(ctl.pending_recolor(), Some(0));
    assert_eq!(exec.inner.run_pending(), 1);
    ctl.tick(Millis(710));
    assert_eq!(ctl.slots()[0].state(), SlotState::Recoloring);
    assert!(ctl.slots()[0].overlay().is_some());
    assert_eq!(cache.computations(), 2);
}

#[test]
fn capacity_two_still_starts_recolors() {
    let mut r = rig(3, cfg());
    assert_eq!(r.ctl.capacity(), 2);

    r.move_to(250.0, 0.0, 0);
    r.move_to(500.0, 0.0, 400);
    assert_eq!(r.ctl.stats().recolors_started, 1);
    assert_eq!(r.ctl.pending_recolor(), Some(0));
    // The capacity check runs after the recolor gate and retires the same slot.
    assert_eq!(r.state(0), SlotState::Retiring);
    assert!(!r.ctl.timeline.is_active(0, Channel::Recolor));

    r.exec.run_pending();
    r.ctl.tick(Millis(410));
    assert_eq!(r.ctl.stats().stale_discards, 1);
    assert!(r.ctl.slots()[0].overlay().is_none());

    let mut t = 800;
    for k in 0..6 {
        let x = if k % 2 == 0 { 750.0 } else { 500.0 };
        r.move_to(x, 0.0, t);
        r.exec.run_pending();
        r.ctl.tick(Millis(t + 10));
        assert!(r.non_idle() <= 2);
        t += 400;
    }
    assert_eq!(r.ctl.stats().spawns, 8);
    assert_eq!(r.ctl.stats().recolors_started, 7);
}

#[test]
fn late_result_for_retired_slot_is_discarded() {
    let mut r = rig(5, cfg());
    r.move_to(250.0, 0.0, 0);
    r.move_to(500.0, 0.0, 400);
    assert_eq!(r.ctl.pending_recolor(), Some(0));

    // Slot 0 retires while its pixels are still queued.
    r.move_to(750.0, 0.0, 800);
    assert_eq!(r.state(0), SlotState::Retiring);
    assert_eq!(r.ctl.pending_recolor(), Some(0));

    r.exec.run_pending();
    r.ctl.tick(Millis(810));
    assert_eq!(r.ctl.stats().stale_discards, 1);
    assert!(r.ctl.slots()[0].overlay().is_none());
    assert_eq!(r.ctl.pending_recolor(), Some(1));
}

#[test]
fn disabling_resets_recolored_slots() {
    let mut r = rig(4, cfg());
    r.move_to(250.0, 0.0, 0);
    r.move_to(500.0, 0.0, 400);
    r.exec.run_pending();
    r.ctl.tick(Millis(410));
    r.ctl.tick(Millis(1000));
    assert!(r.ctl.slots()[0].is_recolored());

    let params = *r.ctl.params();
    r.ctl.update_recolor(params, false).unwrap();
    let s = &r.ctl.slots()[0];
    assert!(!s.is_recolored());
    assert!(s.overlay().is_none());
    assert_eq!(s.state(), SlotState::Visible);
    assert!(!r.ctl.is_enabled());
}

#[test]
fn update_recolor_rejects_invalid_params() {
    let mut r = rig(3, cfg());
    let params = TransformParams {
        intensity: 0.0,
        ..TransformParams::default()
    };
    let before = *r.ctl.params();
    assert!(r.ctl.update_recolor(params, true).is_err());
    assert_eq!(*r.ctl.params(), before);
}

#[test]
fn shutdown_stops_everything() {
    let mut r = rig(4, cfg());
    r.move_to(250.0, 0.0, 0);
    r.move_to(500.0, 0.0, 400);
    assert!(r.ctl.active_tweens() > 0);

    r.ctl.shutdown();
    assert!(r.ctl.is_shut_down());
    assert_eq!(r.ctl.active_tweens(), 0);
    assert_eq!(r.ctl.pending_recolor(), None);
    assert_eq!(r.ctl.debounce_due(), None);

    r.move_to(900.0, 0.0, 5000);
    assert_eq!(r.ctl.stats().spawns, 2);
}
