//! End-to-end runs against the in-memory controller model.

use std::sync::Arc;
use std::time::Duration;

use stage_core::mocks::RecordingObserver;
use stage_core::{
    AxisController, AxisError, HomingPhase, StageConfig, StepperMotor, wait_until_reached,
};
use stage_hardware::{FaultPlan, SimulatedController};
use stage_traits::clock::test_clock::TestClock;
use stage_traits::{AxisParameter, MotorLink};

fn controller(
    sim: Arc<SimulatedController>,
    stage: StageConfig,
) -> (AxisController<Arc<SimulatedController>>, Arc<RecordingObserver>, TestClock) {
    let observer = Arc::new(RecordingObserver::new());
    let clock = TestClock::new();
    let axis = AxisController::builder()
        .with_link(sim)
        .with_stage(stage)
        .with_observer(observer.clone())
        .with_clock(Arc::new(clock.clone()))
        .build()
        .expect("build");
    (axis, observer, clock)
}

#[test]
fn delay_line_homes_then_moves_to_target() {
    let sim = Arc::new(
        SimulatedController::new()
            .with_position(0, 40_000)
            .with_steps_per_tick(10_000),
    );
    let (axis, observer, clock) = controller(sim.clone(), StageConfig::delay_line(0).unwrap());

    axis.initialize().expect("initialize");
    // Initialization zeroed the counter; put the carriage back off the switch.
    sim.set_parameter(0, AxisParameter::ActualPosition, 40_000).unwrap();

    let report = axis.go_to_home_position().expect("homed");
    assert_eq!(report.home_steps, 0);
    assert_eq!(observer.phases().last(), Some(&HomingPhase::Homed));

    axis.move_to(5.0, None).expect("move");
    let outcome = wait_until_reached(
        &axis,
        Duration::from_secs(5),
        Duration::from_millis(200),
        &clock,
    )
    .expect("wait");
    assert!(outcome.is_reached());
    assert_eq!(sim.raw_position(0), Some(axis.geometry().to_steps(5.0)));
}

#[test]
fn unreachable_switch_times_out_and_stops() {
    let sim = Arc::new(
        SimulatedController::new()
            .with_home_switch(0, None)
            .with_position(0, 1_000),
    );
    let (axis, _observer, _clock) = controller(sim.clone(), StageConfig::delay_line(0).unwrap());

    let err = axis.go_to_home_position().expect_err("timeout");

    assert!(matches!(
        err.downcast_ref::<AxisError>(),
        Some(AxisError::HomingTimeout { .. })
    ));
    // Stopped: further reads no longer move the carriage.
    let p1 = sim.raw_position(0);
    sim.get_parameter(0, AxisParameter::ActualPosition).unwrap();
    assert_eq!(sim.raw_position(0), p1);
}

#[test]
fn paddle_homes_by_search_status() {
    let sim = Arc::new(SimulatedController::new().with_position(1, -20_000));
    let (axis, _observer, _clock) =
        controller(sim.clone(), StageConfig::polarization_paddle(1).unwrap());

    let report = axis.go_to_home_position().expect("homed");

    assert_eq!(report.mode, 8);
    assert_eq!(sim.raw_position(1), Some(0));
}

#[test]
fn transport_timeout_is_mapped_precisely() {
    let sim = Arc::new(SimulatedController::new().with_faults(FaultPlan {
        fail_after_calls: Some(0),
        fail_reads_of: None,
    }));
    let (axis, _observer, _clock) = controller(sim, StageConfig::delay_line(0).unwrap());

    let err = axis.position().expect_err("link down");

    assert!(matches!(
        err.downcast_ref::<AxisError>(),
        Some(AxisError::LinkTimeout)
    ));
}
