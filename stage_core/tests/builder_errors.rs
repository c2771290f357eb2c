use stage_core::error::BuildError;
use stage_core::mocks::RecordingLink;
use stage_core::{AxisController, AxisError, StageConfig};
use rstest::rstest;

#[rstest]
fn builder_missing_link_yields_typed_build_error() {
    let err = AxisController::<RecordingLink>::builder()
        // missing with_link()
        .with_stage(StageConfig::delay_line(0).unwrap())
        .try_build()
        .expect_err("should fail with MissingLink");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingLink) => {}
        other => panic!("expected MissingLink, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_stage_yields_typed_build_error() {
    let err = AxisController::builder()
        .with_link(RecordingLink::new())
        .try_build()
        .expect_err("should fail with MissingStage");

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingStage)
    ));
}

#[rstest]
#[case::offset_outside_travel(|s: &mut StageConfig| s.home_offset = 42.0)]
#[case::zero_homing_speed(|s: &mut StageConfig| {
    if let Some(h) = s.homing.as_mut() {
        h.search_speed = 0;
    }
})]
fn builder_rejects_invalid_stage(#[case] mutate: fn(&mut StageConfig)) {
    let mut stage = StageConfig::delay_line(0).unwrap();
    mutate(&mut stage);

    let err = AxisController::builder()
        .with_link(RecordingLink::new())
        .with_stage(stage)
        .build()
        .expect_err("invalid stage");

    assert!(matches!(
        err.downcast_ref::<AxisError>(),
        Some(AxisError::Configuration(_))
    ));
}

#[rstest]
fn builder_rejects_empty_name() {
    let mut stage = StageConfig::polarization_paddle(1).unwrap();
    stage.name = "  ".into();

    let err = stage_core::build_axis(RecordingLink::new(), stage, None, None)
        .expect_err("empty name");

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}
