use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Two simulated stages; the delay line starts 40000 steps off its switch and
// keeps its counter even through self-check.
fn write_config(dir: &tempfile::TempDir, steps_per_tick: u32) -> PathBuf {
    let toml = format!(
        r#"
[controller]
poll_interval_ms = 1

[stages.delay_line]
kind = "linear"
axis = 0
lead_pitch_mm = 5.08
max_travel_mm = 10.0
zero_on_init = false

[stages.delay_line.homing]
mode = 7
search_speed = 10000
switch_speed = 500
timeout_ms = 100
home_condition = "switch"
home_value = 0

[stages.delay_line.simulation]
start_position_steps = 40000
home_switch_steps = 0
steps_per_tick = {steps_per_tick}

[stages.paddle]
kind = "rotary"
axis = 1
full_step_angle_deg = 0.9

[stages.paddle.drive]
run_current = 40
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn stage_cmd(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("stage").unwrap();
    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("error");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["position", "--stage", "delay_line"], 0, "delay_line: 3.968", "stdout")]
#[case(&["move-to", "--stage", "delay_line"], 2, "required", "stderr")]
#[case(&["position", "--stage", "nope"], 1, "configured stage names", "stderr")]
#[case(&["rotate", "--stage", "paddle", "-5000"], 0, "rotating at -5000", "stdout")]
#[case(&["stop", "--stage", "paddle"], 0, "paddle: stopped", "stdout")]
#[case(&["self-check"], 0, "Self-check OK", "stdout")]
#[case(&["init", "--stage", "delay_line"], 0, "initialized; position 3.968", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 10_000);

    let assert = stage_cmd(&cfg).args(args).assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

// Same delay line with the default `zero_on_init`.
fn write_zeroing_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[stages.delay_line]
kind = "linear"
axis = 0
lead_pitch_mm = 5.08
max_travel_mm = 10.0

[stages.delay_line.simulation]
start_position_steps = 40000
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["position", "--stage", "delay_line"], "delay_line: 3.968")]
#[case(&["move-by", "--stage", "delay_line", "1.0"], "(50079 steps)")]
#[case(&["init", "--stage", "delay_line"], "initialized; position 0.0000 mm")]
#[case(&["self-check"], "delay_line: 0.0000 mm")]
fn only_init_and_self_check_zero_the_counter(#[case] args: &[&str], #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_zeroing_config(&dir);

    stage_cmd(&cfg)
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains(needle));
}

#[rstest]
fn move_to_waits_until_reached() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 10_000);

    stage_cmd(&cfg)
        .args(["move-to", "--stage", "delay_line", "5.0", "--wait"])
        .assert()
        .success()
        .stdout(predicate::str::contains("50394 steps"))
        .stdout(predicate::str::contains("reached 5.0000 mm"));
}

#[rstest]
fn out_of_range_target_is_clamped_not_rejected() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 10_000);

    stage_cmd(&cfg)
        .args(["move-to", "--stage", "delay_line", "20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("100787 steps"))
        .stdout(predicate::str::contains("clamped from 20 mm"));
}

#[rstest]
fn move_timeout_stops_and_exits_6() {
    let dir = tempdir().unwrap();
    // One step per read: the carriage cannot cover 10394 steps in 1 ms.
    let cfg = write_config(&dir, 1);

    stage_cmd(&cfg)
        .args([
            "move-to",
            "--stage",
            "delay_line",
            "5.0",
            "--wait",
            "--timeout-ms",
            "1",
        ])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("did not complete within 1 ms"));
}

#[rstest]
fn home_reports_mode_and_offset_position() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 10_000);

    stage_cmd(&cfg)
        .args(["home", "--stage", "delay_line"])
        .assert()
        .success()
        .stdout(predicate::str::contains("homed (mode 7"))
        .stdout(predicate::str::contains("position 0.0000 mm"));
}

#[rstest]
fn unreachable_switch_exits_with_homing_timeout() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 10_000);

    stage_cmd(&cfg)
        .env("STAGE_SIM_NO_HOME", "1")
        .args(["home", "--stage", "delay_line"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "What happened: Homing did not find the home switch within 100 ms",
        ));
}

#[rstest]
fn switch_disabled_in_config_exits_with_homing_timeout() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 10_000);
    let toml = fs::read_to_string(&cfg)
        .unwrap()
        .replace("home_switch_steps = 0", "home_switch_steps = 0\nhome_switch_reachable = false");
    fs::write(&cfg, toml).unwrap();

    stage_cmd(&cfg)
        .args(["home", "--stage", "delay_line"])
        .assert()
        .code(3);
}

#[rstest]
fn link_failure_exits_5() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 10_000);

    stage_cmd(&cfg)
        .env("STAGE_SIM_FAIL_AFTER", "0")
        .args(["position", "--stage", "delay_line"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains(
            "What happened: The motor controller did not answer in time",
        ));
}

#[rstest]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    stage_cmd(&missing)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}

#[rstest]
fn invalid_values_are_reported_with_the_field() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        r#"
[stages.delay_line]
kind = "linear"
axis = 0
lead_pitch_mm = 5.08
max_travel_mm = 10.0
microsteps = 3
"#,
    )
    .unwrap();

    stage_cmd(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("stages.delay_line.microsteps"));
}
