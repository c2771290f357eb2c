use rstest::rstest;
use stage_hardware::error::LinkError;
use stage_hardware::{FaultPlan, SEARCH_ACTIVE, SEARCH_IDLE, SimulatedController};
use stage_traits::{AxisParameter, MotionCommand, MotorLink, ReferenceSearchOp};

#[rstest]
#[case(0, 1)]
#[case(1, 0)]
fn reference_search_drives_to_switch(#[case] active_level: i32, #[case] idle_level: i32) {
    let sim = SimulatedController::new()
        .with_steps_per_tick(1_000)
        .with_position(0, 3_500)
        .with_home_switch(0, Some(0))
        .with_home_active_level(0, active_level);

    assert_eq!(
        sim.get_parameter(0, AxisParameter::HomeSwitch).unwrap(),
        idle_level
    );
    sim.reference_search(0, ReferenceSearchOp::Start).unwrap();
    assert_eq!(
        sim.reference_search(0, ReferenceSearchOp::Status).unwrap(),
        SEARCH_ACTIVE
    );

    let mut polls = 0;
    while sim.get_parameter(0, AxisParameter::HomeSwitch).unwrap() != active_level {
        polls += 1;
        assert!(polls < 10, "switch never asserted");
    }
    assert_eq!(sim.raw_position(0), Some(0));
    assert_eq!(
        sim.reference_search(0, ReferenceSearchOp::Status).unwrap(),
        SEARCH_IDLE
    );
    assert_eq!(sim.register(0, AxisParameter::LastReferencePosition), Some(0));
}

#[test]
fn missing_switch_keeps_search_active() {
    let sim = SimulatedController::new()
        .with_steps_per_tick(10)
        .with_home_switch(1, None);
    sim.reference_search(1, ReferenceSearchOp::Start).unwrap();
    for _ in 0..50 {
        assert_eq!(sim.get_parameter(1, AxisParameter::HomeSwitch).unwrap(), 1);
    }
    assert_eq!(
        sim.reference_search(1, ReferenceSearchOp::Status).unwrap(),
        SEARCH_ACTIVE
    );
    sim.reference_search(1, ReferenceSearchOp::Stop).unwrap();
    assert_eq!(
        sim.reference_search(1, ReferenceSearchOp::Status).unwrap(),
        SEARCH_IDLE
    );
}

#[test]
fn fail_after_calls_fails_everything_afterwards() {
    let sim = SimulatedController::new().with_faults(FaultPlan {
        fail_after_calls: Some(2),
        ..FaultPlan::default()
    });
    sim.motion(0, MotionCommand::Stop).unwrap();
    sim.motion(0, MotionCommand::Stop).unwrap();
    let err = sim.motion(0, MotionCommand::Stop).expect_err("third call fails");
    assert!(matches!(
        err.downcast_ref::<LinkError>(),
        Some(LinkError::Timeout)
    ));
    assert!(sim.reference_search(0, ReferenceSearchOp::Stop).is_err());
    assert_eq!(sim.calls(), 4);
}

#[test]
fn fail_reads_of_targets_one_register() {
    let sim = SimulatedController::new().with_faults(FaultPlan {
        fail_reads_of: Some(AxisParameter::HomeSwitch),
        ..FaultPlan::default()
    });
    assert!(sim.get_parameter(2, AxisParameter::ActualPosition).is_ok());
    let err = sim
        .get_parameter(2, AxisParameter::HomeSwitch)
        .expect_err("home switch read fails");
    assert!(matches!(
        err.downcast_ref::<LinkError>(),
        Some(LinkError::Fault(_))
    ));
}

#[test]
fn writing_actual_position_redefines_origin() {
    let sim = SimulatedController::new().with_position(0, 1234);
    sim.set_parameter(0, AxisParameter::ActualPosition, 0).unwrap();
    assert_eq!(sim.get_parameter(0, AxisParameter::ActualPosition).unwrap(), 0);
    assert_eq!(
        sim.get_parameter(0, AxisParameter::PositionReachedFlag).unwrap(),
        1
    );
}
