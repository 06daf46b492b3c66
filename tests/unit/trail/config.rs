use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = TrailConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.visible_capacity, 3);
    assert_eq!(cfg.color_a, Rgb8::new(234, 218, 179));
    assert_eq!(cfg.recolor_params(), TransformParams::default());
}

#[test]
fn partial_json_fills_defaults() {
    let cfg = TrailConfig::from_json_str(
        r#"{ "visible_capacity": 4, "color_b": "rgb(1,2,3)", "spawn_cooldown_ms": 0 }"#,
    )
    .unwrap();
    assert_eq!(cfg.visible_capacity, 4);
    assert_eq!(cfg.color_b, Rgb8::new(1, 2, 3));
    assert_eq!(cfg.spawn_cooldown_ms, 0);
    assert_eq!(cfg.spawn_threshold_px, 200.0);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = TrailConfig::from_json_str(r#"{ "visibleTotal": 4 }"#).unwrap_err();
    assert!(err.to_string().contains("validation error"));
}

#[test]
fn out_of_range_values_are_rejected() {
    let cases = [
        r#"{ "visible_capacity": 0 }"#,
        r#"{ "spawn_threshold_px": 0.0 }"#,
        r#"{ "noise_amount": 1.0 }"#,
        r#"{ "intensity": 0.0 }"#,
        r#"{ "recolor_duration_secs": 0.0 }"#,
        r#"{ "smoothing": 0.0 }"#,
        r#"{ "size_variants": [] }"#,
        r#"{ "size_variants": [{ "width": 0.0, "height": 10.0 }] }"#,
    ];
    for case in cases {
        assert!(TrailConfig::from_json_str(case).is_err(), "accepted {case}");
    }
}

#[test]
fn effective_capacity_leaves_one_free_slot() {
    let cfg = TrailConfig {
        visible_capacity: 4,
        ..TrailConfig::default()
    };
    assert_eq!(cfg.effective_capacity(10), 4);
    assert_eq!(cfg.effective_capacity(4), 3);
    assert_eq!(cfg.effective_capacity(2), 1);
    assert_eq!(cfg.effective_capacity(1), 1);
}
