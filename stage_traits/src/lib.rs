//! Boundary traits between the stage control core and the controller link.
//!
//! The core never talks to a transport directly: every register access, motion
//! primitive and reference-search operation goes through [`MotorLink`].

pub mod clock;
pub mod parameter;

pub use clock::{Clock, MonotonicClock};
pub use parameter::{AxisParameter, REGISTER_MAP_VERSION};

use std::sync::Arc;

/// Error type crossing the link boundary. Implementations are free to box any
/// transport error; the core maps it to its own typed errors.
pub type LinkResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Primitive motion commands understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCommand {
    /// Continuous rotation; the sign selects the direction.
    Rotate { velocity: i32 },
    /// Absolute move to a target in microsteps.
    MoveTo { position: i32 },
    /// Immediate stop.
    Stop,
}

/// Reference search sub-commands. The discriminants are the controller's
/// command-type values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReferenceSearchOp {
    Start = 0,
    Stop = 1,
    Status = 2,
}

impl ReferenceSearchOp {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Request/response access to one multi-axis stepper controller.
///
/// Methods take `&self`: a link is shared by every axis on the module, and an
/// implementation must serialize frames internally so commands for different
/// axes (or a stop issued from another thread) never interleave mid-frame.
pub trait MotorLink: Send + Sync {
    fn set_parameter(&self, axis: u8, param: AxisParameter, value: i32) -> LinkResult<()>;
    fn get_parameter(&self, axis: u8, param: AxisParameter) -> LinkResult<i32>;
    fn motion(&self, axis: u8, command: MotionCommand) -> LinkResult<()>;
    /// Start and Stop return 0; Status returns the controller's search status.
    fn reference_search(&self, axis: u8, op: ReferenceSearchOp) -> LinkResult<i32>;
}

impl<T: MotorLink + ?Sized> MotorLink for Arc<T> {
    fn set_parameter(&self, axis: u8, param: AxisParameter, value: i32) -> LinkResult<()> {
        (**self).set_parameter(axis, param, value)
    }
    fn get_parameter(&self, axis: u8, param: AxisParameter) -> LinkResult<i32> {
        (**self).get_parameter(axis, param)
    }
    fn motion(&self, axis: u8, command: MotionCommand) -> LinkResult<()> {
        (**self).motion(axis, command)
    }
    fn reference_search(&self, axis: u8, op: ReferenceSearchOp) -> LinkResult<i32> {
        (**self).reference_search(axis, op)
    }
}

impl<T: MotorLink + ?Sized> MotorLink for Box<T> {
    fn set_parameter(&self, axis: u8, param: AxisParameter, value: i32) -> LinkResult<()> {
        (**self).set_parameter(axis, param, value)
    }
    fn get_parameter(&self, axis: u8, param: AxisParameter) -> LinkResult<i32> {
        (**self).get_parameter(axis, param)
    }
    fn motion(&self, axis: u8, command: MotionCommand) -> LinkResult<()> {
        (**self).motion(axis, command)
    }
    fn reference_search(&self, axis: u8, op: ReferenceSearchOp) -> LinkResult<i32> {
        (**self).reference_search(axis, op)
    }
}
