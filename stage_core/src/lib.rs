#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Stepper stage control core (transport-agnostic).
//!
//! This crate turns physical targets (millimeters, degrees) into controller
//! commands and runs the bounded homing sequence. All controller access goes
//! through `stage_traits::MotorLink`.
//!
//! ## Architecture
//!
//! - **Geometry**: unit conversion and software travel limits (`geometry`)
//! - **Motion**: one command per call, clamping with warnings (`motion`)
//! - **Homing**: explicit reference-search state machine (`homing`)
//! - **Stages**: `AxisController` behind the `StepperMotor` trait (`stage`)
//! - **Settings**: register writes applied at initialization (`config`)
//! - **Monitoring**: bounded wait for move completion (`monitor`)
//!
//! ## Step Arithmetic
//!
//! Positions cross the link as `i32` microsteps. Conversion rounds to nearest
//! and saturates; see `fixed_point::quantize_to_steps`.

pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod fixed_point;
pub mod geometry;
pub mod homing;
pub mod link_error;
pub mod mocks;
pub mod monitor;
pub mod motion;
pub mod observer;
pub mod stage;
pub mod util;

pub use builder::{AxisControllerBuilder, build_axis};
pub use config::{
    AxisSettings, CoolStepSettings, DriveSettings, Microsteps, PwmSettings, RampSettings,
    StageConfig, StageKind, StallGuardSettings,
};
pub use error::{AxisError, AxisResult, BuildError, Result};
pub use geometry::{AxisGeometry, Clamped, LimitSide, StepDrive};
pub use homing::{
    HomeCondition, HomingPhase, HomingReport, HomingRun, HomingStateMachine,
    ReferenceSearchConfig, SearchModeSelect,
};
pub use monitor::{MoveOutcome, wait_until_reached};
pub use motion::{Axis, MotionController, MoveReport, StopHandle};
pub use observer::{MotionObserver, MotionWarning, TracingObserver};
pub use stage::{AxisController, StepperMotor};
