use super::*;

fn linear(duration_ms: u64) -> TweenSpec {
    TweenSpec::progress(duration_ms, Ease::Linear)
}

#[test]
fn advance_reports_progress_then_completes_once() {
    let mut tl = Timeline::new();
    let id = tl.start(0, Channel::Retire, linear(100), Millis(1000));

    let ups = tl.advance(Millis(1050));
    assert_eq!(ups.len(), 1);
    assert_eq!(ups[0].id, id);
    assert!((ups[0].value - 0.5).abs() < 1e-9);
    assert!(!ups[0].completed);

    let ups = tl.advance(Millis(1200));
    assert_eq!(ups.len(), 1);
    assert!(ups[0].completed);
    assert_eq!(ups[0].value, 1.0);

    assert!(tl.advance(Millis(1300)).is_empty());
    assert!(tl.is_empty());
}

#[test]
fn zero_duration_completes_immediately() {
    let mut tl = Timeline::new();
    tl.start(3, Channel::Intro, linear(0), Millis(10));
    let ups = tl.advance(Millis(10));
    assert!(ups[0].completed);
    assert_eq!(ups[0].target, 3);
}

#[test]
fn start_replaces_same_target_and_channel() {
    let mut tl = Timeline::new();
    let a = tl.start(1, Channel::Recolor, linear(100), Millis(0));
    let b = tl.start(1, Channel::Recolor, linear(100), Millis(50));
    assert_ne!(a, b);
    assert_eq!(tl.len(), 1);
    tl.start(1, Channel::Retire, linear(100), Millis(50));
    assert_eq!(tl.len(), 2);
}

#[test]
fn cancel_stops_updates_immediately() {
    let mut tl = Timeline::new();
    let id = tl.start(2, Channel::Recolor, linear(100), Millis(0));
    tl.start(2, Channel::Intro, linear(100), Millis(0));
    tl.start(5, Channel::Intro, linear(100), Millis(0));

    assert_eq!(tl.cancel(2, Channel::Recolor), Some(id));
    assert_eq!(tl.cancel(2, Channel::Recolor), None);
    assert_eq!(tl.cancel_target(2), 1);

    let ups = tl.advance(Millis(10));
    assert_eq!(ups.len(), 1);
    assert_eq!(ups[0].target, 5);
    assert_eq!(tl.clear(), 1);
}

#[test]
fn from_to_values_are_eased() {
    let mut tl = Timeline::new();
    tl.start(
        0,
        Channel::Retire,
        TweenSpec {
            from: 1.0,
            to: 0.0,
            duration_ms: 100,
            ease: Ease::OutQuart,
        },
        Millis(0),
    );
    let v = tl.advance(Millis(50))[0].value;
    assert!((v - (1.0 - Ease::OutQuart.apply(0.5))).abs() < 1e-12);
}
