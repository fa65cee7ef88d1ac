use rstest::rstest;
use tensile_config::load_toml;

const PINS: &str = r#"
[pins]
hx711_dt = 5
hx711_sck = 6
motor_step = 18
motor_dir = 19
motor_en = 26
"#;

#[test]
fn pins_only_config_gets_rig_defaults() {
    let cfg = load_toml(PINS).expect("parse TOML");
    cfg.validate().expect("defaults should validate");

    assert_eq!(cfg.motor.steps_per_rev, 1600);
    assert_eq!(cfg.motor.travel_per_rev_mm, 3.125);
    assert_eq!(cfg.motor.jog_frequency_hz, 853.0);
    assert_eq!(cfg.sampling.period_us, 12_500);
    assert_eq!(cfg.sampling.tick_budget_ms, 15);
    assert_eq!(cfg.sampling.filter_threshold, 15.0);
    assert_eq!(cfg.sampling.filter_tolerance, 2.0);
    assert_eq!(cfg.sensor.read_timeout_ms, 500);
    assert_eq!(cfg.run.log_interval_ms, 150);
    assert_eq!(cfg.run.force_drop_abort, 0.0);
    assert_eq!(cfg.run.log_base_name, "tensile_log");
}

#[test]
fn missing_pins_section_fails_to_parse() {
    let err = load_toml("[motor]\nsteps_per_rev = 200\n").expect_err("pins required");
    assert!(err.to_string().contains("pins"));
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let toml = format!("{PINS}\n[run]\nfeed_rate_mm_min = 12.0\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    assert_eq!(cfg.run.feed_rate_mm_min, 12.0);
    assert_eq!(cfg.run.pull_length_mm, 5.0);
}

#[rstest]
#[case("[sampling]\nperiod_us = 0\n", "sampling.period_us must be > 0")]
#[case("[sampling]\ntick_budget_ms = 0\n", "sampling.tick_budget_ms must be >= 1")]
#[case("[motor]\nsteps_per_rev = 0\n", "motor.steps_per_rev must be > 0")]
#[case("[motor]\ntravel_per_rev_mm = -1.0\n", "motor.travel_per_rev_mm must be > 0")]
#[case("[motor]\njog_frequency_hz = 0.0\n", "motor.jog_frequency_hz must be > 0")]
#[case("[sensor]\nreference_unit = 0.0\n", "sensor.reference_unit must be finite and non-zero")]
#[case("[sensor]\ntare_samples = 0\n", "sensor.tare_samples must be >= 1")]
#[case("[run]\nfeed_rate_mm_min = 0.5\n", "run.feed_rate_mm_min must be >= 1")]
#[case("[run]\npull_length_mm = 0.0\n", "run.pull_length_mm must be >= 1")]
#[case("[run]\nforce_drop_abort = -5.0\n", "run.force_drop_abort must be >= 0")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_out_of_range_values(#[case] section: &str, #[case] needle: &str) {
    let toml = format!("{PINS}\n{section}");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        err.to_string().contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn rejects_shared_pins() {
    let toml = r#"
[pins]
hx711_dt = 5
hx711_sck = 5
motor_step = 18
motor_dir = 19
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("duplicate pin");
    assert!(err.to_string().contains("pins must be distinct"));
}
