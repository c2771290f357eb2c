#![allow(dead_code)]

use std::sync::Arc;

use stage_core::mocks::{RecordingLink, RecordingObserver};
use stage_core::{
    AxisController, AxisGeometry, AxisSettings, ReferenceSearchConfig, StageConfig, StageKind,
};
use stage_traits::clock::test_clock::TestClock;

/// Stage with an explicit scale and range, homing with the delay-line defaults.
pub fn custom_stage(steps_per_unit: f64, min: i32, max: i32, kind: StageKind) -> StageConfig {
    StageConfig {
        name: "test_stage".into(),
        kind,
        axis: 0,
        geometry: AxisGeometry::new(steps_per_unit, min, max).expect("geometry"),
        home_offset: 0.0,
        settings: AxisSettings::default(),
        homing: Some(ReferenceSearchConfig::linear_default()),
    }
}

pub struct Rig {
    pub link: RecordingLink,
    pub observer: Arc<RecordingObserver>,
    pub clock: TestClock,
    pub stage: AxisController<RecordingLink>,
}

pub fn rig(stage: StageConfig, link: RecordingLink) -> Rig {
    let observer = Arc::new(RecordingObserver::new());
    let clock = TestClock::new();
    let controller = AxisController::builder()
        .with_link(link.clone())
        .with_stage(stage)
        .with_observer(observer.clone())
        .with_clock(Arc::new(clock.clone()))
        .build()
        .expect("build axis controller");
    Rig {
        link,
        observer,
        clock,
        stage: controller,
    }
}
