use filler_config::{Config, load_toml};
use rstest::rstest;

#[test]
fn empty_toml_yields_valid_defaults() {
    let cfg = load_toml("").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.pins.pump, 23);
    assert_eq!(cfg.buttons.samples_stable, 5);
    assert_eq!(cfg.process.target_volume_ml, 500.0);
    assert!((cfg.ml_per_pulse() - 1000.0 / 16818.0).abs() < 1e-9);
}

#[test]
fn partial_sections_fill_from_defaults() {
    let cfg = load_toml(
        r#"
[process]
target_volume_ml = 330.0

[presence]
threshold_cm = 7.5
"#,
    )
    .unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.process.target_volume_ml, 330.0);
    assert_eq!(cfg.process.fill_timeout_ms, 30_000);
    assert_eq!(cfg.presence.threshold_cm, 7.5);
    assert_eq!(cfg.presence.samples_stable, 3);
}

#[test]
fn persisted_calibration_overrides_flow_constant() {
    let cfg = load_toml(
        r#"
[flow]
ml_per_pulse = 0.05

[calibration]
ml_per_pulse = 0.061
"#,
    )
    .unwrap();
    assert_eq!(cfg.ml_per_pulse(), 0.061);
}

#[rstest]
#[case("[buttons]\nperiod_ms = 0\n", "buttons.period_ms")]
#[case("[buttons]\nsamples_stable = 0\n", "buttons.samples_stable")]
#[case("[presence]\nsamples_stable = 0\n", "presence.samples_stable")]
#[case("[presence]\nthreshold_cm = -1.0\n", "presence.threshold_cm")]
#[case("[presence]\necho_timeout_us = 0\n", "presence.echo_timeout_us")]
#[case("[flow]\nml_per_pulse = 0.0\n", "ml_per_pulse")]
#[case("[process]\ntarget_volume_ml = 0.0\n", "target_volume_ml")]
#[case("[process]\nfill_timeout_ms = 6000000\n", "fill_timeout_ms")]
#[case("[process]\ncontrol_period_ms = 0\n", "control_period_ms")]
#[case(
    "[process]\nno_flow_timeout_ms = 30000\nfill_timeout_ms = 30000\n",
    "no_flow_timeout_ms"
)]
fn invalid_values_are_rejected(#[case] toml: &str, #[case] expected_field: &str) {
    let cfg = load_toml(toml).unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(
        err.to_string().contains(expected_field),
        "error {err} should mention {expected_field}"
    );
}

#[test]
fn unknown_rotation_is_kept_as_plain_string() {
    let cfg: Config = load_toml("[logging]\nrotation = \"daily\"\n").unwrap();
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}
