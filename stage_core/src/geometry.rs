//! Conversion and clamping between physical units and controller microsteps.
//!
//! `AxisGeometry` is pure: no I/O, no interior state after construction. Every
//! caller-supplied position is converted with [`AxisGeometry::to_steps`] and
//! bounded with [`AxisGeometry::clamp`] before it reaches the link.

use crate::error::{AxisError, AxisResult};
use crate::fixed_point::{floor_to_steps, quantize_to_steps};

/// Full circle in degrees; the unit pitch of a rotary axis.
pub const DEGREES_PER_REV: f64 = 360.0;

/// Which software travel limit a request was clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSide {
    Min,
    Max,
}

/// Result of bounding a step count to the travel range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamped {
    /// Step count before clamping.
    pub requested: i32,
    /// Step count that may be sent to the controller.
    pub steps: i32,
    /// `Some` when `requested` was outside the range.
    pub limit: Option<LimitSide>,
}

impl Clamped {
    #[inline]
    pub fn was_clamped(&self) -> bool {
        self.limit.is_some()
    }
}

/// Motor step angle and microstep factor: everything needed to know how many
/// microsteps one shaft revolution takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDrive {
    pub full_step_angle_deg: f64,
    pub microstep_factor: u32,
}

impl StepDrive {
    pub fn new(full_step_angle_deg: f64, microstep_factor: u32) -> Self {
        Self {
            full_step_angle_deg,
            microstep_factor,
        }
    }

    /// Microsteps per shaft revolution: `round(360 / angle × factor)`.
    pub fn steps_per_revolution(&self) -> AxisResult<f64> {
        let angle = self.full_step_angle_deg;
        if !angle.is_finite() || angle <= 0.0 || angle > DEGREES_PER_REV {
            return Err(AxisError::Configuration(format!(
                "full step angle must be within (0, 360] degrees, got {angle}"
            )));
        }
        if self.microstep_factor == 0 {
            return Err(AxisError::Configuration(
                "microstep factor must be >= 1".into(),
            ));
        }
        Ok((DEGREES_PER_REV / angle * f64::from(self.microstep_factor)).round())
    }
}

/// Immutable unit conversion and travel range for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisGeometry {
    steps_per_unit: f64,
    min_steps: i32,
    max_steps: i32,
}

impl AxisGeometry {
    /// Build a geometry from an explicit scale and step range.
    pub fn new(steps_per_unit: f64, min_steps: i32, max_steps: i32) -> AxisResult<Self> {
        if !steps_per_unit.is_finite() || steps_per_unit <= 0.0 {
            return Err(AxisError::Configuration(format!(
                "steps per unit must be finite and > 0, got {steps_per_unit}"
            )));
        }
        if min_steps > max_steps {
            return Err(AxisError::Configuration(format!(
                "travel range is empty: min {min_steps} > max {max_steps}"
            )));
        }
        Ok(Self {
            steps_per_unit,
            min_steps,
            max_steps,
        })
    }

    /// Lead-screw stage in millimeters, travel `[0, max_travel_mm]`.
    ///
    /// The upper limit is floored so it never lies past the physical end of
    /// travel.
    pub fn linear(drive: StepDrive, lead_pitch_mm: f64, max_travel_mm: f64) -> AxisResult<Self> {
        if !lead_pitch_mm.is_finite() || lead_pitch_mm <= 0.0 {
            return Err(AxisError::Configuration(format!(
                "lead pitch must be finite and > 0 mm, got {lead_pitch_mm}"
            )));
        }
        if !max_travel_mm.is_finite() || max_travel_mm < 0.0 {
            return Err(AxisError::Configuration(format!(
                "max travel must be finite and >= 0 mm, got {max_travel_mm}"
            )));
        }
        let steps_per_unit = drive.steps_per_revolution()? / lead_pitch_mm;
        Self::new(steps_per_unit, 0, floor_to_steps(max_travel_mm * steps_per_unit))
    }

    /// Rotary stage in degrees, travel `[-180°, +180°]`.
    pub fn rotary(drive: StepDrive) -> AxisResult<Self> {
        let steps_rev = drive.steps_per_revolution()?;
        let half_turn = floor_to_steps(steps_rev / 2.0);
        Self::new(steps_rev / DEGREES_PER_REV, -half_turn, half_turn)
    }

    #[inline]
    pub fn steps_per_unit(&self) -> f64 {
        self.steps_per_unit
    }

    #[inline]
    pub fn min_steps(&self) -> i32 {
        self.min_steps
    }

    #[inline]
    pub fn max_steps(&self) -> i32 {
        self.max_steps
    }

    /// Physical position to microsteps, rounded to nearest and saturating.
    #[inline]
    pub fn to_steps(&self, position: f64) -> i32 {
        quantize_to_steps(position * self.steps_per_unit)
    }

    /// Microsteps to physical position.
    #[inline]
    pub fn from_steps(&self, steps: i32) -> f64 {
        f64::from(steps) / self.steps_per_unit
    }

    /// Physical size of one microstep.
    #[inline]
    pub fn resolution(&self) -> f64 {
        1.0 / self.steps_per_unit
    }

    pub fn clamp(&self, steps: i32) -> Clamped {
        let limit = if steps < self.min_steps {
            Some(LimitSide::Min)
        } else if steps > self.max_steps {
            Some(LimitSide::Max)
        } else {
            None
        };
        Clamped {
            requested: steps,
            steps: steps.clamp(self.min_steps, self.max_steps),
            limit,
        }
    }

    /// `to_steps` followed by `clamp`.
    #[inline]
    pub fn target(&self, position: f64) -> Clamped {
        self.clamp(self.to_steps(position))
    }

    pub fn minimum_position(&self) -> f64 {
        self.from_steps(self.min_steps)
    }

    pub fn maximum_position(&self) -> f64 {
        self.from_steps(self.max_steps)
    }

    pub fn contains(&self, steps: i32) -> bool {
        (self.min_steps..=self.max_steps).contains(&steps)
    }
}
