mod common;

use std::time::Duration;

use common::{custom_stage, rig};
use stage_core::mocks::{CallKind, RecordingLink};
use stage_core::{
    AxisError, HomeCondition, HomingPhase, MotionWarning, ReferenceSearchConfig,
    SearchModeSelect, StageConfig, StageKind, StepperMotor,
};
use stage_traits::{AxisParameter, MotionCommand, ReferenceSearchOp};

fn delay_line_with_offset(offset_mm: f64) -> StageConfig {
    let mut stage = StageConfig::delay_line(0).expect("preset");
    stage.home_offset = offset_mm;
    stage
}

#[test]
fn switch_trips_before_timeout_homes_and_redefines_origin() {
    let stage = delay_line_with_offset(2.0);
    let home_steps = stage.geometry.to_steps(2.0);
    let r = rig(
        stage,
        RecordingLink::new().script_reads(AxisParameter::HomeSwitch, [1, 1, 0]),
    );

    let report = r.stage.go_to_home_position().expect("homed");

    assert_eq!(report.polls, 3);
    assert_eq!(report.mode, 7);
    assert_eq!(report.home_steps, home_steps);
    assert_eq!(r.link.register(AxisParameter::ActualPosition), Some(home_steps));
    assert!(r.link.motions().is_empty(), "no stop on success");
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 0);
    assert_eq!(
        r.observer.phases(),
        vec![
            HomingPhase::SearchStarting,
            HomingPhase::Searching,
            HomingPhase::Confirming,
            HomingPhase::Homed,
        ]
    );
    assert_eq!(r.clock.elapsed(), Duration::from_millis(400));
}

#[test]
fn search_parameters_are_written_before_start() {
    let r = rig(StageConfig::delay_line(0).unwrap(), RecordingLink::new());

    r.stage.go_to_home_position().expect("homed");

    let writes = r.link.writes();
    assert_eq!(
        &writes[..3],
        &[
            (AxisParameter::ReferenceSearchMode, 7),
            (AxisParameter::ReferenceSearchSpeed, 10_000),
            (AxisParameter::RefSwitchSpeed, 500),
        ]
    );
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Start)), 1);
}

#[test]
fn switch_never_trips_times_out_with_exactly_one_stop() {
    let r = rig(
        StageConfig::delay_line(0).unwrap(),
        RecordingLink::new().with_register(AxisParameter::HomeSwitch, 1),
    );

    let err = r.stage.go_to_home_position().expect_err("timeout");

    match err.downcast_ref::<AxisError>() {
        Some(AxisError::HomingTimeout {
            elapsed_ms,
            timeout_ms,
        }) => {
            assert_eq!(*timeout_ms, 10_000);
            assert!(
                (10_000..=10_200).contains(elapsed_ms),
                "elapsed {elapsed_ms} ms"
            );
        }
        other => panic!("expected HomingTimeout, got {other:?}"),
    }
    assert_eq!(r.link.motions(), vec![MotionCommand::Stop]);
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 0);
    assert_eq!(r.observer.phases().last(), Some(&HomingPhase::TimedOut));
    assert!(r
        .observer
        .warnings()
        .iter()
        .any(|w| matches!(w, MotionWarning::HomingTimedOut { .. })));
}

#[test]
fn timeout_stop_failure_is_recorded_not_masking() {
    let r = rig(
        StageConfig::delay_line(0).unwrap(),
        RecordingLink::new()
            .with_register(AxisParameter::HomeSwitch, 1)
            .fail(CallKind::Stop, "stop rejected"),
    );
    let mut machine = r.stage.homing_machine(ReferenceSearchConfig::linear_default(), 0);

    assert_eq!(machine.run(), HomingPhase::TimedOut);
    assert!(machine.run_state().recovery_error().is_some());
    assert!(matches!(
        machine.into_result(),
        Err(AxisError::HomingTimeout { .. })
    ));
    assert_eq!(r.link.count(CallKind::Stop), 1);
}

#[test]
fn link_error_mid_search_faults_with_one_cancel() {
    let r = rig(
        StageConfig::delay_line(0).unwrap(),
        RecordingLink::new()
            .script_reads(AxisParameter::HomeSwitch, [1, 1])
            .fail_after(CallKind::Get(AxisParameter::HomeSwitch), 2, "bus fault"),
    );

    let err = r.stage.go_to_home_position().expect_err("fault");

    match err.downcast_ref::<AxisError>() {
        Some(AxisError::HomingFaulted {
            error,
            cancel_error: None,
        }) => assert!(matches!(**error, AxisError::Link(_))),
        other => panic!("expected HomingFaulted, got {other:?}"),
    }
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 1);
    assert!(r.link.motions().is_empty());
}

#[test]
fn failed_cancel_is_recorded_and_not_retried() {
    let r = rig(
        StageConfig::delay_line(0).unwrap(),
        RecordingLink::new()
            .fail(CallKind::Get(AxisParameter::HomeSwitch), "bus fault")
            .fail(CallKind::Search(ReferenceSearchOp::Stop), "cancel lost"),
    );

    let err = r.stage.go_to_home_position().expect_err("fault");

    match err.downcast_ref::<AxisError>() {
        Some(AxisError::HomingFaulted {
            error,
            cancel_error: Some(cancel),
        }) => {
            assert!(error.to_string().contains("bus fault"));
            assert!(cancel.to_string().contains("cancel lost"));
        }
        other => panic!("expected HomingFaulted with cancel error, got {other:?}"),
    }
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 1);
    assert!(r
        .observer
        .warnings()
        .iter()
        .any(|w| matches!(w, MotionWarning::RecoveryFailed { .. })));
}

#[test]
fn config_write_failure_faults_without_cancel() {
    let r = rig(
        StageConfig::delay_line(0).unwrap(),
        RecordingLink::new().fail(
            CallKind::Set(AxisParameter::ReferenceSearchSpeed),
            "nak",
        ),
    );

    let err = r.stage.go_to_home_position().expect_err("fault");

    assert!(matches!(
        err.downcast_ref::<AxisError>(),
        Some(AxisError::HomingFaulted { .. })
    ));
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Start)), 0);
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 0);
    assert_eq!(
        r.observer.phases(),
        vec![HomingPhase::SearchStarting, HomingPhase::Faulted]
    );
}

#[test]
fn failed_start_command_cancels_once() {
    let r = rig(
        StageConfig::delay_line(0).unwrap(),
        RecordingLink::new().fail(CallKind::Search(ReferenceSearchOp::Start), "nak"),
    );

    let err = r.stage.go_to_home_position().expect_err("fault");

    assert!(matches!(
        err.downcast_ref::<AxisError>(),
        Some(AxisError::HomingFaulted { .. })
    ));
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 1);
}

#[test]
fn rotary_status_polling_cancels_search_on_home() {
    let r = rig(
        StageConfig::polarization_paddle(1).unwrap(),
        RecordingLink::new().script_search_status([1, 1, 0]),
    );

    let report = r.stage.go_to_home_position().expect("homed");

    assert_eq!(report.mode, 8);
    assert_eq!(report.polls, 3);
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Status)), 3);
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 1);
    assert_eq!(r.link.register(AxisParameter::ActualPosition), Some(0));
}

#[test]
fn failed_origin_write_cancels_search_once() {
    let config = ReferenceSearchConfig {
        cancel_search_on_home: false,
        ..ReferenceSearchConfig::rotary_default()
    };
    let r = rig(
        StageConfig::polarization_paddle(1).unwrap(),
        RecordingLink::new()
            .script_search_status([0])
            .fail(CallKind::Set(AxisParameter::ActualPosition), "write failed"),
    );

    let err = r.stage.go_to_home_position_with(config).expect_err("fault");

    match err.downcast_ref::<AxisError>() {
        Some(AxisError::HomingFaulted { cancel_error, .. }) => assert!(cancel_error.is_none()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 1);
    assert_eq!(
        r.observer.phases(),
        vec![
            HomingPhase::SearchStarting,
            HomingPhase::Searching,
            HomingPhase::Confirming,
            HomingPhase::Faulted,
        ]
    );
}

#[test]
fn failed_cancel_on_home_faults_without_retrying() {
    let r = rig(
        StageConfig::polarization_paddle(1).unwrap(),
        RecordingLink::new()
            .script_search_status([0])
            .fail(CallKind::Search(ReferenceSearchOp::Stop), "stop failed"),
    );

    let err = r.stage.go_to_home_position().expect_err("fault");

    assert!(matches!(
        err.downcast_ref::<AxisError>(),
        Some(AxisError::HomingFaulted { .. })
    ));
    assert_eq!(r.link.count(CallKind::Search(ReferenceSearchOp::Stop)), 1);
    // The origin is never redefined.
    assert_eq!(r.link.count(CallKind::Set(AxisParameter::ActualPosition)), 0);
    assert_eq!(r.observer.phases().last(), Some(&HomingPhase::Faulted));
}

#[test]
fn sensor_state_selects_search_mode() {
    let config = ReferenceSearchConfig {
        mode: SearchModeSelect::BySensorState {
            when_clear: 8,
            when_asserted: 132,
        },
        home_condition: HomeCondition::SwitchEquals(0),
        ..ReferenceSearchConfig::rotary_default()
    };
    let r = rig(
        StageConfig::polarization_paddle(1).unwrap(),
        // First read picks the mode, the rest are polls.
        RecordingLink::new().script_reads(AxisParameter::HomeSwitch, [1, 1, 0]),
    );

    let report = r.stage.go_to_home_position_with(config).expect("homed");

    assert_eq!(report.mode, 132);
    assert_eq!(
        r.link.writes()[0],
        (AxisParameter::ReferenceSearchMode, 132)
    );
}

#[test]
fn stepping_reports_each_phase() {
    let r = rig(
        custom_stage(1000.0, 0, 5000, StageKind::Linear),
        RecordingLink::new().script_reads(AxisParameter::HomeSwitch, [1, 0]),
    );
    let mut machine = r.stage.homing_machine(ReferenceSearchConfig::linear_default(), 0);

    assert_eq!(machine.phase(), HomingPhase::Idle);
    assert_eq!(machine.advance(), HomingPhase::SearchStarting);
    assert_eq!(machine.advance(), HomingPhase::Searching);
    assert_eq!(machine.advance(), HomingPhase::Searching);
    assert_eq!(machine.run_state().last_sensor(), Some(1));
    assert_eq!(machine.advance(), HomingPhase::Confirming);
    assert_eq!(machine.advance(), HomingPhase::Homed);
    // Terminal phases are sticky.
    assert_eq!(machine.advance(), HomingPhase::Homed);
    assert_eq!(machine.run_state().polls(), 2);
}

#[test]
fn stage_without_homing_reports_configuration_error() {
    let mut stage = custom_stage(1000.0, 0, 5000, StageKind::Linear);
    stage.homing = None;
    let r = rig(stage, RecordingLink::new());

    let err = r.stage.go_to_home_position().expect_err("no homing");

    assert!(matches!(
        err.downcast_ref::<AxisError>(),
        Some(AxisError::Configuration(_))
    ));
    assert!(r.link.calls().is_empty());
}

#[test]
fn invalid_override_is_rejected_before_any_call() {
    let r = rig(StageConfig::delay_line(0).unwrap(), RecordingLink::new());
    let config = ReferenceSearchConfig {
        timeout: Duration::ZERO,
        ..ReferenceSearchConfig::linear_default()
    };

    let err = r
        .stage
        .go_to_home_position_with(config)
        .expect_err("zero timeout");

    assert!(format!("{err:#}").contains("invalid homing parameters"));
    assert!(r.link.calls().is_empty());
}
