//! Single-axis motion orchestration on top of a `MotorLink`.
//!
//! `MotionController` converts physical targets with `AxisGeometry`, clamps
//! them to the travel range, and issues exactly one motion command per call.
//! It never retries and never blocks waiting for completion; see
//! `crate::monitor` for the polling helper.

use std::sync::Arc;

use stage_traits::{AxisParameter, MotionCommand, MotorLink, ReferenceSearchOp};

use crate::config::AxisSettings;
use crate::error::{AxisError, AxisResult};
use crate::geometry::AxisGeometry;
use crate::link_error::map_link_error;
use crate::observer::{MotionObserver, MotionWarning, TracingObserver};

/// One physical degree of freedom: its index on the module and its geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub index: u8,
    pub geometry: AxisGeometry,
}

/// What a `move_to` actually commanded.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    /// Caller's target in physical units.
    pub requested: f64,
    /// Step count sent to the controller.
    pub steps: i32,
    /// `steps` converted back to physical units.
    pub position: f64,
    /// Set when the target had to be clamped.
    pub warning: Option<MotionWarning>,
}

impl MoveReport {
    pub fn was_clamped(&self) -> bool {
        matches!(self.warning, Some(MotionWarning::LimitClamped { .. }))
    }
}

pub struct MotionController<L> {
    link: L,
    axis: Axis,
    observer: Arc<dyn MotionObserver>,
}

impl<L: Clone> Clone for MotionController<L> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            axis: self.axis,
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<L> core::fmt::Debug for MotionController<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionController")
            .field("axis", &self.axis.index)
            .field("min_steps", &self.axis.geometry.min_steps())
            .field("max_steps", &self.axis.geometry.max_steps())
            .finish()
    }
}

impl<L: MotorLink> MotionController<L> {
    pub fn new(link: L, axis: Axis) -> Self {
        Self {
            link,
            axis,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn MotionObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[inline]
    pub fn axis(&self) -> u8 {
        self.axis.index
    }

    #[inline]
    pub fn geometry(&self) -> &AxisGeometry {
        &self.axis.geometry
    }

    pub fn observer(&self) -> &Arc<dyn MotionObserver> {
        &self.observer
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Continuous rotation; the sign of `velocity` selects the direction.
    pub fn rotate(&self, velocity: i32) -> AxisResult<()> {
        tracing::info!(axis = self.axis.index, velocity, "rotate");
        self.command(MotionCommand::Rotate { velocity })
    }

    /// Absolute move. Out-of-range targets are clamped to the nearest limit
    /// and reported through the observer; the move still happens.
    pub fn move_to(&self, position: f64, velocity: Option<u32>) -> AxisResult<MoveReport> {
        if velocity == Some(0) {
            return Err(AxisError::Configuration(
                "velocity override must be > 0".into(),
            ));
        }
        let target = self.axis.geometry.target(position);
        let warning = target.limit.map(|limit| MotionWarning::LimitClamped {
            axis: self.axis.index,
            requested_steps: target.requested,
            issued_steps: target.steps,
            limit,
        });
        if let Some(w) = &warning {
            self.observer.on_warning(w);
        }
        if let Some(v) = velocity {
            let v = i32::try_from(v).unwrap_or(i32::MAX);
            self.write(AxisParameter::MaxVelocity, v)?;
        }
        tracing::info!(
            axis = self.axis.index,
            position,
            steps = target.steps,
            clamped = target.was_clamped(),
            "move_to"
        );
        self.command(MotionCommand::MoveTo {
            position: target.steps,
        })?;
        Ok(MoveReport {
            requested: position,
            steps: target.steps,
            position: self.axis.geometry.from_steps(target.steps),
            warning,
        })
    }

    /// Relative move from the current actual position.
    ///
    /// Read-then-write: a concurrent writer between the two could make the
    /// result stale. Only one writer per axis is supported.
    pub fn move_by(&self, delta: f64, velocity: Option<u32>) -> AxisResult<MoveReport> {
        let current = self.position()?;
        self.move_to(current + delta, velocity)
    }

    /// Immediate stop. Safe at any time; repeated calls each issue a command.
    pub fn stop(&self) -> AxisResult<()> {
        tracing::info!(axis = self.axis.index, "stop");
        self.command(MotionCommand::Stop)
    }

    /// Actual position in physical units.
    pub fn position(&self) -> AxisResult<f64> {
        Ok(self.axis.geometry.from_steps(self.raw_position()?))
    }

    pub fn raw_position(&self) -> AxisResult<i32> {
        self.read(AxisParameter::ActualPosition)
    }

    pub fn is_position_reached(&self) -> AxisResult<bool> {
        Ok(self.read(AxisParameter::PositionReachedFlag)? != 0)
    }

    /// Redefine the current physical location as `steps` without moving.
    pub fn set_actual_position(&self, steps: i32) -> AxisResult<()> {
        tracing::info!(axis = self.axis.index, steps, "set actual position");
        self.write(AxisParameter::ActualPosition, steps)
    }

    /// Write all configured registers, then zero the position if requested.
    pub fn apply_settings(&self, settings: &AxisSettings) -> AxisResult<()> {
        for (param, value) in settings.writes() {
            tracing::debug!(axis = self.axis.index, %param, value, "apply setting");
            self.write(param, value)?;
        }
        if settings.zero_on_init {
            self.set_actual_position(0)?;
        }
        Ok(())
    }

    pub fn write(&self, param: AxisParameter, value: i32) -> AxisResult<()> {
        self.link
            .set_parameter(self.axis.index, param, value)
            .map_err(|e| map_link_error(&*e))
    }

    pub fn read(&self, param: AxisParameter) -> AxisResult<i32> {
        self.link
            .get_parameter(self.axis.index, param)
            .map_err(|e| map_link_error(&*e))
    }

    pub fn reference_search(&self, op: ReferenceSearchOp) -> AxisResult<i32> {
        self.link
            .reference_search(self.axis.index, op)
            .map_err(|e| map_link_error(&*e))
    }

    fn command(&self, command: MotionCommand) -> AxisResult<()> {
        self.link
            .motion(self.axis.index, command)
            .map_err(|e| map_link_error(&*e))
    }
}

impl<L: MotorLink + Clone + 'static> MotionController<L> {
    /// A handle that can stop this axis from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            axis: self.axis.index,
            link: Arc::new(self.link.clone()),
        }
    }
}

/// Thread-safe stop trigger for one axis (e.g. from a Ctrl-C handler).
#[derive(Clone)]
pub struct StopHandle {
    axis: u8,
    link: Arc<dyn MotorLink>,
}

impl core::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StopHandle").field("axis", &self.axis).finish()
    }
}

impl StopHandle {
    pub fn axis(&self) -> u8 {
        self.axis
    }

    pub fn stop(&self) -> AxisResult<()> {
        tracing::warn!(axis = self.axis, "external stop");
        self.link
            .motion(self.axis, MotionCommand::Stop)
            .map_err(|e| map_link_error(&*e))
    }
}
