//! Per-stage facade: one `AxisController` per physical stage behind the
//! `StepperMotor` capability.
//!
//! Linear and rotary stages are the same type with different `StageConfig`
//! data; callers never branch on kinematics.

use std::sync::Arc;

use eyre::WrapErr;
use stage_traits::{Clock, MotorLink};

use crate::config::{StageConfig, StageKind};
use crate::error::{AxisError, Result};
use crate::geometry::AxisGeometry;
use crate::homing::{HomingReport, HomingStateMachine, ReferenceSearchConfig};
use crate::motion::{MotionController, MoveReport, StopHandle};

/// What a caller can do with any stage.
pub trait StepperMotor {
    /// Continuous rotation in controller velocity units; sign is direction.
    fn rotate(&self, velocity: i32) -> Result<()>;
    fn move_to(&self, position: f64, velocity: Option<u32>) -> Result<MoveReport>;
    fn move_by(&self, delta: f64, velocity: Option<u32>) -> Result<MoveReport>;
    fn stop(&self) -> Result<()>;
    fn position(&self) -> Result<f64>;
    fn is_position_reached(&self) -> Result<bool>;
    fn minimum_position(&self) -> f64;
    fn maximum_position(&self) -> f64;
    /// Run the stage's configured reference search to completion.
    fn go_to_home_position(&self) -> Result<HomingReport>;
}

pub struct AxisController<L> {
    pub(crate) stage: StageConfig,
    pub(crate) motion: MotionController<L>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
}

impl<L> core::fmt::Debug for AxisController<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AxisController")
            .field("name", &self.stage.name)
            .field("kind", &self.stage.kind)
            .field("axis", &self.stage.axis)
            .finish()
    }
}

#[inline]
fn report(e: AxisError) -> eyre::Report {
    eyre::Report::new(e)
}

impl<L: MotorLink> AxisController<L> {
    pub fn name(&self) -> &str {
        &self.stage.name
    }

    pub fn kind(&self) -> StageKind {
        self.stage.kind
    }

    pub fn axis(&self) -> u8 {
        self.stage.axis
    }

    pub fn unit(&self) -> &'static str {
        self.stage.kind.unit()
    }

    pub fn geometry(&self) -> &AxisGeometry {
        self.motion.geometry()
    }

    pub fn stage_config(&self) -> &StageConfig {
        &self.stage
    }

    /// Lower-level access for callers that need raw register I/O.
    pub fn motion(&self) -> &MotionController<L> {
        &self.motion
    }

    /// Apply drive, ramp, PWM, StallGuard and CoolStep settings, then zero the
    /// position if configured. Stops at the first failed write.
    pub fn initialize(&self) -> Result<()> {
        tracing::info!(
            stage = %self.stage.name,
            axis = self.stage.axis,
            kind = ?self.stage.kind,
            "initialize axis"
        );
        self.motion
            .apply_settings(&self.stage.settings)
            .map_err(report)
            .wrap_err_with(|| format!("initializing stage '{}'", self.stage.name))
    }

    /// Home with explicit parameters instead of the stage defaults.
    pub fn go_to_home_position_with(&self, config: ReferenceSearchConfig) -> Result<HomingReport> {
        config
            .validate()
            .map_err(report)
            .wrap_err("invalid homing parameters")?;
        let home_steps = self.stage.home_offset_steps().map_err(report)?;
        let mut machine = self.homing_machine(config, home_steps);
        machine.run();
        machine
            .into_result()
            .map_err(report)
            .wrap_err_with(|| format!("homing stage '{}'", self.stage.name))
    }

    /// A homing state machine for stepping through a run phase by phase.
    pub fn homing_machine(
        &self,
        config: ReferenceSearchConfig,
        home_steps: i32,
    ) -> HomingStateMachine<'_, L> {
        HomingStateMachine::new(&self.motion, &*self.clock, config, home_steps)
    }
}

impl<L: MotorLink + Clone + 'static> AxisController<L> {
    /// A `Send + Sync` trigger that stops this axis from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.motion.stop_handle()
    }
}

impl<L: MotorLink> StepperMotor for AxisController<L> {
    fn rotate(&self, velocity: i32) -> Result<()> {
        self.motion
            .rotate(velocity)
            .map_err(report)
            .wrap_err("rotate")
    }

    fn move_to(&self, position: f64, velocity: Option<u32>) -> Result<MoveReport> {
        self.motion
            .move_to(position, velocity)
            .map_err(report)
            .wrap_err_with(|| format!("move to {position} {}", self.unit()))
    }

    fn move_by(&self, delta: f64, velocity: Option<u32>) -> Result<MoveReport> {
        self.motion
            .move_by(delta, velocity)
            .map_err(report)
            .wrap_err_with(|| format!("move by {delta} {}", self.unit()))
    }

    fn stop(&self) -> Result<()> {
        self.motion.stop().map_err(report).wrap_err("stop")
    }

    fn position(&self) -> Result<f64> {
        self.motion
            .position()
            .map_err(report)
            .wrap_err("reading position")
    }

    fn is_position_reached(&self) -> Result<bool> {
        self.motion
            .is_position_reached()
            .map_err(report)
            .wrap_err("reading position-reached flag")
    }

    fn minimum_position(&self) -> f64 {
        self.motion.geometry().minimum_position()
    }

    fn maximum_position(&self) -> f64 {
        self.motion.geometry().maximum_position()
    }

    fn go_to_home_position(&self) -> Result<HomingReport> {
        let config = self.stage.homing.clone().ok_or_else(|| {
            report(AxisError::Configuration(format!(
                "stage '{}' has no homing configuration",
                self.stage.name
            )))
        })?;
        self.go_to_home_position_with(config)
    }
}
