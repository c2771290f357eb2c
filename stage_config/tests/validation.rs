use rstest::rstest;
use stage_config::{HomeConditionCfg, SearchModeCfg, StageKind, load_file, load_toml};

const VALID: &str = r#"
[controller]
module_id = 1
poll_interval_ms = 200

[stages.delay_line]
kind = "linear"
axis = 0
full_step_angle_deg = 1.8
microsteps = 256
lead_pitch_mm = 5.08
max_travel_mm = 10.0

[stages.delay_line.drive]
run_current = 8
standby_current = 0
freewheeling_mode = 3

[stages.delay_line.pwm]
grad = 1
amplitude = 64
autoscale = true
threshold_speed = 51200

[stages.delay_line.homing]
mode = 7
search_speed = 10000
switch_speed = 500
timeout_ms = 10000
home_condition = "switch"
home_value = 0

[stages.paddle]
kind = "rotary"
axis = 1
full_step_angle_deg = 0.9

[stages.paddle.drive]
run_current = 40

[stages.paddle.homing]
mode = { when_clear = 8, when_asserted = 132 }
search_speed = 5000
switch_speed = 500
timeout_ms = 10000
home_condition = "search_status"
cancel_search_on_home = true
"#;

#[test]
fn accepts_reference_config() {
    let cfg = load_toml(VALID).expect("parse TOML");
    cfg.validate().expect("valid config should pass");

    let dl = cfg.stage("delay_line").unwrap();
    assert_eq!(dl.kind, StageKind::Linear);
    assert_eq!(dl.ramp.max_velocity, 30_000);
    assert!(dl.zero_on_init);
    let homing = dl.homing.as_ref().unwrap();
    assert_eq!(homing.mode, SearchModeCfg::Fixed(7));
    assert_eq!(homing.home_condition, HomeConditionCfg::Switch);

    let paddle = cfg.stage("paddle").unwrap();
    assert_eq!(paddle.microsteps, 256);
    assert_eq!(
        paddle.homing.as_ref().unwrap().mode,
        SearchModeCfg::BySensorState {
            when_clear: 8,
            when_asserted: 132
        }
    );
}

#[test]
fn unknown_stage_lists_known_names() {
    let cfg = load_toml(VALID).unwrap();
    let err = cfg.stage("nope").expect_err("no such stage");
    let msg = format!("{err}");
    assert!(msg.contains("delay_line") && msg.contains("paddle"), "{msg}");
}

#[rstest]
#[case("lead_pitch_mm = 5.08", "lead_pitch_mm = 0.0", "lead_pitch_mm must be > 0")]
#[case("lead_pitch_mm = 5.08\n", "", "lead_pitch_mm is required")]
#[case("microsteps = 256\nlead", "microsteps = 100\nlead", "microsteps must be a power of two")]
#[case("axis = 1", "axis = 0", "already used")]
#[case("timeout_ms = 10000\nhome_condition = \"switch\"", "timeout_ms = 0\nhome_condition = \"switch\"", "timeout_ms must be >= 1")]
#[case("poll_interval_ms = 200", "poll_interval_ms = 0", "poll_interval_ms must be >= 1")]
#[case("full_step_angle_deg = 0.9", "full_step_angle_deg = 0.9\nmax_travel_mm = 3.0", "only apply to linear stages")]
fn rejects_invalid_values(#[case] from: &str, #[case] to: &str, #[case] needle: &str) {
    assert!(VALID.contains(from), "fixture does not contain {from:?}");
    let toml = VALID.replacen(from, to, 1);
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn rejects_unknown_home_condition_at_parse_time() {
    let toml = VALID.replace("\"search_status\"", "\"limit\"");
    assert!(load_toml(&toml).is_err());
}

#[test]
fn requires_at_least_one_stage() {
    let cfg = load_toml("[stages]\n").expect("parse TOML");
    let err = cfg.validate().expect_err("empty stages");
    assert!(format!("{err}").contains("at least one"));
}

#[test]
fn load_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stages.toml");
    std::fs::write(&path, VALID).unwrap();
    let cfg = load_file(&path).expect("load");
    assert_eq!(cfg.stages.len(), 2);

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}

#[test]
fn simulated_home_switch_can_be_made_unreachable() {
    let cfg = load_toml(VALID).expect("parse TOML");
    let dl = cfg.stage("delay_line").unwrap();
    assert_eq!(dl.simulation.home_switch(), Some(0));

    let toml = format!(
        "{VALID}\n[stages.delay_line.simulation]\nhome_switch_steps = 500\nhome_switch_reachable = false\n"
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    let dl = cfg.stage("delay_line").unwrap();
    assert_eq!(dl.simulation.home_switch_steps, 500);
    assert_eq!(dl.simulation.home_switch(), None);
}
