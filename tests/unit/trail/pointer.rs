use super::*;

fn sample(x: f64, y: f64, t: u64) -> PointerSample {
    PointerSample::new(x, y, Millis(t))
}

#[test]
fn first_sample_seeds_smoothed_position() {
    let mut p = PointerSampler::new(0.3);
    p.tick();
    assert!(!p.is_primed());
    p.observe(sample(50.0, 80.0, 0));
    assert_eq!(p.smoothed(), Point::new(50.0, 80.0));
}

#[test]
fn smoothing_covers_fixed_fraction_per_tick() {
    let mut p = PointerSampler::new(0.3);
    p.observe(sample(0.0, 0.0, 0));
    p.observe(sample(100.0, 0.0, 16));
    p.tick();
    assert!((p.smoothed().x - 30.0).abs() < 1e-9);
    p.tick();
    assert!((p.smoothed().x - 51.0).abs() < 1e-9);
    assert_eq!(p.raw(), Point::new(100.0, 0.0));
}

#[test]
fn distance_is_measured_from_last_spawn() {
    let mut p = PointerSampler::new(0.3);
    p.observe(sample(30.0, 40.0, 0));
    assert!((p.distance_since_last_spawn() - 50.0).abs() < 1e-9);

    p.mark_spawn(Millis(10));
    assert_eq!(p.distance_since_last_spawn(), 0.0);
    assert_eq!(p.since_last_spawn(Millis(110)), Some(100));

    p.observe(sample(30.0, 140.0, 20));
    assert!((p.distance_since_last_spawn() - 100.0).abs() < 1e-9);
}

#[test]
fn no_spawn_recorded_initially() {
    let p = PointerSampler::new(0.5);
    assert_eq!(p.since_last_spawn(Millis(1000)), None);
    assert_eq!(p.last_sample_at(), None);
}
