//! Controller backends implementing `stage_traits::MotorLink`.
//!
//! Only the simulated TMCM-3212 module lives here; a wire transport plugs in
//! behind the same trait.

pub mod error;

use std::collections::BTreeMap;
use std::sync::Mutex;

use stage_traits::{AxisParameter, LinkResult, MotionCommand, MotorLink, ReferenceSearchOp};
use tracing::{debug, trace};

use crate::error::LinkError;

/// Number of axes on the simulated module.
pub const SIM_AXES: usize = 3;

/// Reference-search status reported while a search is running.
pub const SEARCH_ACTIVE: i32 = 1;
/// Reference-search status reported once no search is running.
pub const SEARCH_IDLE: i32 = 0;

/// Failure injection for exercising fault paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultPlan {
    /// Every call after this many successful calls fails.
    pub fail_after_calls: Option<usize>,
    /// Reads of this register always fail.
    pub fail_reads_of: Option<AxisParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drive {
    Idle,
    Positioning(i32),
    Velocity(i32),
    Searching,
}

#[derive(Debug)]
struct SimAxis {
    registers: BTreeMap<AxisParameter, i32>,
    drive: Drive,
    /// Position of the home switch; `None` means the switch is never reached.
    home_switch_at: Option<i32>,
    /// Register value of `HomeSwitch` while the switch is asserted.
    home_active_level: i32,
}

impl SimAxis {
    fn new() -> Self {
        let mut registers = BTreeMap::new();
        registers.insert(AxisParameter::ActualPosition, 0);
        registers.insert(AxisParameter::PositionReachedFlag, 1);
        registers.insert(AxisParameter::MaxVelocity, 2047);
        registers.insert(AxisParameter::MaxAcceleration, 2047);
        Self {
            registers,
            drive: Drive::Idle,
            home_switch_at: Some(0),
            home_active_level: 0,
        }
    }

    fn reg(&self, p: AxisParameter) -> i32 {
        self.registers.get(&p).copied().unwrap_or(0)
    }

    fn actual(&self) -> i32 {
        self.reg(AxisParameter::ActualPosition)
    }

    fn switch_asserted(&self) -> bool {
        self.home_switch_at == Some(self.actual())
    }

    fn home_switch_value(&self) -> i32 {
        if self.switch_asserted() {
            self.home_active_level
        } else {
            i32::from(self.home_active_level == 0)
        }
    }

    /// Advance the simulated motion by one tick of at most `step` microsteps.
    fn tick(&mut self, step: i32) {
        let actual = self.actual();
        let next = match self.drive {
            Drive::Idle => return,
            Drive::Positioning(target) => {
                let next = approach(actual, target, step);
                if next == target {
                    self.drive = Drive::Idle;
                    self.registers.insert(AxisParameter::PositionReachedFlag, 1);
                }
                next
            }
            Drive::Velocity(v) => actual.saturating_add(v.signum().saturating_mul(step)),
            Drive::Searching => match self.home_switch_at {
                Some(switch) => {
                    let next = approach(actual, switch, step);
                    if next == switch {
                        self.drive = Drive::Idle;
                        self.registers
                            .insert(AxisParameter::LastReferencePosition, switch);
                    }
                    next
                }
                // No switch: keep creeping in the negative direction.
                None => actual.saturating_sub(step),
            },
        };
        self.registers.insert(AxisParameter::ActualPosition, next);
    }
}

fn approach(from: i32, to: i32, step: i32) -> i32 {
    if from < to {
        from.saturating_add(step).min(to)
    } else {
        from.saturating_sub(step).max(to)
    }
}

#[derive(Debug)]
struct Inner {
    axes: Vec<SimAxis>,
    calls: usize,
}

/// In-memory model of a three-axis stepper module.
///
/// Motion is not time based: every position-related read (and every
/// reference-search status query) advances the active axis by
/// `steps_per_tick` microsteps, so a polling loop observes progress exactly
/// like it would on the bench.
#[derive(Debug)]
pub struct SimulatedController {
    module_id: u8,
    steps_per_tick: i32,
    faults: FaultPlan,
    inner: Mutex<Inner>,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedController {
    pub fn new() -> Self {
        Self {
            module_id: 1,
            steps_per_tick: 10_000,
            faults: FaultPlan::default(),
            inner: Mutex::new(Inner {
                axes: (0..SIM_AXES).map(|_| SimAxis::new()).collect(),
                calls: 0,
            }),
        }
    }

    pub fn with_module_id(mut self, module_id: u8) -> Self {
        self.module_id = module_id;
        self
    }

    /// Microsteps moved per position read while an axis is in motion.
    pub fn with_steps_per_tick(mut self, steps: u32) -> Self {
        self.steps_per_tick = i32::try_from(steps.max(1)).unwrap_or(i32::MAX);
        self
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Place the home switch of `axis` at `position` microsteps (`None`: never
    /// reachable). Out-of-range axes are ignored.
    pub fn with_home_switch(self, axis: u8, position: Option<i32>) -> Self {
        self.update_axis(axis, |a| a.home_switch_at = position);
        self
    }

    /// Register value reported by `HomeSwitch` while asserted (default 0).
    pub fn with_home_active_level(self, axis: u8, level: i32) -> Self {
        self.update_axis(axis, |a| a.home_active_level = level);
        self
    }

    /// Start `axis` at `position` microsteps.
    pub fn with_position(self, axis: u8, position: i32) -> Self {
        self.update_axis(axis, |a| {
            a.registers.insert(AxisParameter::ActualPosition, position);
        });
        self
    }

    pub fn module_id(&self) -> u8 {
        self.module_id
    }

    /// Current raw position of `axis` without advancing the simulation.
    pub fn raw_position(&self, axis: u8) -> Option<i32> {
        let inner = self.inner.lock().ok()?;
        inner.axes.get(usize::from(axis)).map(SimAxis::actual)
    }

    /// Last value written to (or reported by) a register, without side effects.
    pub fn register(&self, axis: u8, param: AxisParameter) -> Option<i32> {
        let inner = self.inner.lock().ok()?;
        inner.axes.get(usize::from(axis)).map(|a| a.reg(param))
    }

    /// Total number of link calls served, including failed ones.
    pub fn calls(&self) -> usize {
        self.inner.lock().map(|i| i.calls).unwrap_or(0)
    }

    fn update_axis(&self, axis: u8, f: impl FnOnce(&mut SimAxis)) {
        if let Ok(mut inner) = self.inner.lock()
            && let Some(a) = inner.axes.get_mut(usize::from(axis))
        {
            f(a);
        }
    }

    /// Serialize one request: count it, apply fault injection, resolve the axis.
    fn with_axis<T>(
        &self,
        axis: u8,
        f: impl FnOnce(&mut SimAxis, i32) -> Result<T, LinkError>,
    ) -> LinkResult<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LinkError::Fault("simulator state poisoned".into()))?;
        inner.calls += 1;
        if let Some(limit) = self.faults.fail_after_calls
            && inner.calls > limit
        {
            return Err(Box::new(LinkError::Timeout));
        }
        let step = self.steps_per_tick;
        let a = inner
            .axes
            .get_mut(usize::from(axis))
            .ok_or(LinkError::InvalidAxis(axis))?;
        Ok(f(a, step)?)
    }
}

impl MotorLink for SimulatedController {
    fn set_parameter(&self, axis: u8, param: AxisParameter, value: i32) -> LinkResult<()> {
        self.with_axis(axis, |a, _| {
            if param.is_read_only() {
                return Err(LinkError::Rejected {
                    param,
                    reason: "read-only register",
                });
            }
            trace!(axis, %param, value, "sim set_parameter");
            a.registers.insert(param, value);
            if param == AxisParameter::ActualPosition && a.drive == Drive::Idle {
                a.registers.insert(AxisParameter::PositionReachedFlag, 1);
            }
            Ok(())
        })
    }

    fn get_parameter(&self, axis: u8, param: AxisParameter) -> LinkResult<i32> {
        let fail_read = self.faults.fail_reads_of == Some(param);
        self.with_axis(axis, |a, step| {
            if fail_read {
                return Err(LinkError::Fault(format!("read of {param} failed")));
            }
            match param {
                AxisParameter::ActualPosition
                | AxisParameter::PositionReachedFlag
                | AxisParameter::HomeSwitch => a.tick(step),
                _ => {}
            }
            let value = match param {
                AxisParameter::HomeSwitch => a.home_switch_value(),
                AxisParameter::ActualVelocity => match a.drive {
                    Drive::Idle => 0,
                    Drive::Velocity(v) => v,
                    Drive::Positioning(_) | Drive::Searching => {
                        a.reg(AxisParameter::MaxVelocity)
                    }
                },
                other => a.reg(other),
            };
            trace!(axis, %param, value, "sim get_parameter");
            Ok(value)
        })
    }

    fn motion(&self, axis: u8, command: MotionCommand) -> LinkResult<()> {
        self.with_axis(axis, |a, _| {
            debug!(axis, ?command, "sim motion");
            match command {
                MotionCommand::Rotate { velocity } => {
                    a.drive = if velocity == 0 {
                        Drive::Idle
                    } else {
                        Drive::Velocity(velocity)
                    };
                    a.registers.insert(AxisParameter::PositionReachedFlag, 0);
                }
                MotionCommand::MoveTo { position } => {
                    a.registers.insert(AxisParameter::TargetPosition, position);
                    if a.actual() == position {
                        a.drive = Drive::Idle;
                        a.registers.insert(AxisParameter::PositionReachedFlag, 1);
                    } else {
                        a.drive = Drive::Positioning(position);
                        a.registers.insert(AxisParameter::PositionReachedFlag, 0);
                    }
                }
                MotionCommand::Stop => {
                    a.drive = Drive::Idle;
                }
            }
            Ok(())
        })
    }

    fn reference_search(&self, axis: u8, op: ReferenceSearchOp) -> LinkResult<i32> {
        self.with_axis(axis, |a, step| {
            debug!(axis, ?op, "sim reference_search");
            match op {
                ReferenceSearchOp::Start => {
                    a.drive = Drive::Searching;
                    a.registers.insert(AxisParameter::PositionReachedFlag, 0);
                    Ok(0)
                }
                ReferenceSearchOp::Stop => {
                    if a.drive == Drive::Searching {
                        a.drive = Drive::Idle;
                    }
                    Ok(0)
                }
                ReferenceSearchOp::Status => {
                    a.tick(step);
                    Ok(if a.drive == Drive::Searching {
                        SEARCH_ACTIVE
                    } else {
                        SEARCH_IDLE
                    })
                }
            }
        })
    }
}
