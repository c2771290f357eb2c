//! Runtime configuration for one stage axis.
//!
//! Each settings group produces the register writes it stands for, so every
//! group can be checked on its own. They are applied once at axis
//! initialization (`AxisController::initialize`). These are separate from the
//! TOML-deserialized config in `stage_config`.

use stage_traits::AxisParameter;

use crate::error::{AxisError, AxisResult};
use crate::geometry::{AxisGeometry, StepDrive};
use crate::homing::ReferenceSearchConfig;

/// A single register write: `(parameter, value)`.
pub type RegisterWrite = (AxisParameter, i32);

#[inline]
fn sat_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Microstep resolution. The register takes log2 of the factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Microsteps {
    Full,
    Half,
    X4,
    X8,
    X16,
    X32,
    X64,
    X128,
    #[default]
    X256,
}

impl Microsteps {
    /// Microsteps per full step.
    pub fn factor(self) -> u32 {
        1 << self.register_value()
    }

    /// Value written to `MicrostepResolution`.
    pub fn register_value(self) -> u8 {
        match self {
            Self::Full => 0,
            Self::Half => 1,
            Self::X4 => 2,
            Self::X8 => 3,
            Self::X16 => 4,
            Self::X32 => 5,
            Self::X64 => 6,
            Self::X128 => 7,
            Self::X256 => 8,
        }
    }

    pub fn from_factor(factor: u32) -> Option<Self> {
        Some(match factor {
            1 => Self::Full,
            2 => Self::Half,
            4 => Self::X4,
            8 => Self::X8,
            16 => Self::X16,
            32 => Self::X32,
            64 => Self::X64,
            128 => Self::X128,
            256 => Self::X256,
            _ => return None,
        })
    }
}

/// Motor currents and microstepping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveSettings {
    /// Run current scale (0..=255 controller units).
    pub run_current: u8,
    pub standby_current: u8,
    pub microsteps: Microsteps,
    /// Behaviour at standstill; left untouched when `None`.
    pub freewheeling_mode: Option<u8>,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            run_current: 8,
            standby_current: 0,
            microsteps: Microsteps::X256,
            freewheeling_mode: None,
        }
    }
}

impl DriveSettings {
    pub fn writes(&self) -> Vec<RegisterWrite> {
        let mut w = vec![
            (AxisParameter::RunCurrent, i32::from(self.run_current)),
            (AxisParameter::StandbyCurrent, i32::from(self.standby_current)),
            (
                AxisParameter::MicrostepResolution,
                i32::from(self.microsteps.register_value()),
            ),
        ];
        if let Some(mode) = self.freewheeling_mode {
            w.push((AxisParameter::FreewheelingMode, i32::from(mode)));
        }
        w
    }
}

/// Ramp limits in controller velocity/acceleration units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampSettings {
    pub max_velocity: u32,
    pub max_acceleration: u32,
}

impl Default for RampSettings {
    fn default() -> Self {
        Self {
            max_velocity: 30_000,
            max_acceleration: 30_000,
        }
    }
}

impl RampSettings {
    pub fn writes(&self) -> Vec<RegisterWrite> {
        vec![
            (AxisParameter::MaxVelocity, sat_i32(self.max_velocity)),
            (AxisParameter::MaxAcceleration, sat_i32(self.max_acceleration)),
        ]
    }
}

/// StealthChop voltage PWM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmSettings {
    pub grad: u8,
    pub amplitude: u8,
    pub autoscale: bool,
    /// Velocity above which the driver leaves PWM mode.
    pub threshold_speed: u32,
}

impl PwmSettings {
    pub fn writes(&self) -> Vec<RegisterWrite> {
        vec![
            (AxisParameter::PwmGrad, i32::from(self.grad)),
            (AxisParameter::PwmAmplitude, i32::from(self.amplitude)),
            (AxisParameter::PwmAutoscale, i32::from(self.autoscale)),
            (AxisParameter::PwmThresholdSpeed, sat_i32(self.threshold_speed)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallGuardSettings {
    pub filter_enable: bool,
    /// Signed sensitivity, -64..=63.
    pub threshold: i8,
}

impl StallGuardSettings {
    pub fn writes(&self) -> Vec<RegisterWrite> {
        vec![
            (
                AxisParameter::StallGuard2FilterEnable,
                i32::from(self.filter_enable),
            ),
            (AxisParameter::StallGuard2Threshold, i32::from(self.threshold)),
        ]
    }
}

/// Load-adaptive current control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoolStepSettings {
    pub minimum_current: u8,
    pub down_step: u8,
    pub hysteresis: u8,
    pub up_step: u8,
    pub hysteresis_start: u8,
    pub threshold_speed: u32,
}

impl CoolStepSettings {
    pub fn writes(&self) -> Vec<RegisterWrite> {
        vec![
            (
                AxisParameter::SmartEnergyMinimum,
                i32::from(self.minimum_current),
            ),
            (AxisParameter::SmartEnergyDownStep, i32::from(self.down_step)),
            (
                AxisParameter::SmartEnergyHysteresis,
                i32::from(self.hysteresis),
            ),
            (AxisParameter::SmartEnergyUpStep, i32::from(self.up_step)),
            (
                AxisParameter::SmartEnergyHysteresisStart,
                i32::from(self.hysteresis_start),
            ),
            (
                AxisParameter::SmartEnergyThresholdSpeed,
                sat_i32(self.threshold_speed),
            ),
        ]
    }
}

/// Everything written to the controller when an axis is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AxisSettings {
    pub drive: DriveSettings,
    pub ramp: RampSettings,
    pub pwm: Option<PwmSettings>,
    pub stallguard: Option<StallGuardSettings>,
    pub coolstep: Option<CoolStepSettings>,
    /// Reset ActualPosition to 0 after the settings are applied.
    pub zero_on_init: bool,
}

impl AxisSettings {
    /// All register writes in application order. The position reset, if any,
    /// is not included.
    pub fn writes(&self) -> Vec<RegisterWrite> {
        let mut w = self.drive.writes();
        w.extend(self.ramp.writes());
        if let Some(pwm) = &self.pwm {
            w.extend(pwm.writes());
        }
        if let Some(sg) = &self.stallguard {
            w.extend(sg.writes());
        }
        if let Some(cs) = &self.coolstep {
            w.extend(cs.writes());
        }
        w
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Lead-screw stage, positions in millimeters.
    Linear,
    /// Rotation stage, positions in degrees.
    Rotary,
}

impl StageKind {
    pub fn unit(self) -> &'static str {
        match self {
            Self::Linear => "mm",
            Self::Rotary => "deg",
        }
    }
}

/// Complete description of one physical stage.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub name: String,
    pub kind: StageKind,
    pub axis: u8,
    pub geometry: AxisGeometry,
    /// Physical position the origin is redefined to after homing.
    pub home_offset: f64,
    pub settings: AxisSettings,
    /// Default homing parameters; `None` disables homing for the stage.
    pub homing: Option<ReferenceSearchConfig>,
}

impl StageConfig {
    /// Optical delay line: 1.8° motor, 5.08 mm lead screw, 10 mm travel.
    pub fn delay_line(axis: u8) -> AxisResult<Self> {
        let drive = DriveSettings {
            run_current: 8,
            standby_current: 0,
            microsteps: Microsteps::X256,
            freewheeling_mode: Some(3),
        };
        let geometry = AxisGeometry::linear(
            StepDrive::new(1.8, drive.microsteps.factor()),
            5.08,
            10.0,
        )?;
        Ok(Self {
            name: "delay_line".into(),
            kind: StageKind::Linear,
            axis,
            geometry,
            home_offset: 0.0,
            settings: AxisSettings {
                drive,
                ramp: RampSettings::default(),
                pwm: Some(PwmSettings {
                    grad: 1,
                    amplitude: 64,
                    autoscale: true,
                    threshold_speed: 51_200,
                }),
                stallguard: None,
                coolstep: None,
                zero_on_init: true,
            },
            homing: Some(ReferenceSearchConfig::linear_default()),
        })
    }

    /// Polarization paddle: 0.9° motor, ±180°.
    pub fn polarization_paddle(axis: u8) -> AxisResult<Self> {
        let drive = DriveSettings {
            run_current: 40,
            standby_current: 0,
            microsteps: Microsteps::X256,
            freewheeling_mode: None,
        };
        let geometry = AxisGeometry::rotary(StepDrive::new(0.9, drive.microsteps.factor()))?;
        Ok(Self {
            name: "polarization_paddle".into(),
            kind: StageKind::Rotary,
            axis,
            geometry,
            home_offset: 0.0,
            settings: AxisSettings {
                drive,
                ramp: RampSettings::default(),
                pwm: None,
                stallguard: None,
                coolstep: None,
                zero_on_init: true,
            },
            homing: Some(ReferenceSearchConfig::rotary_default()),
        })
    }

    /// Home offset in steps, rejected when outside the travel range.
    pub fn home_offset_steps(&self) -> AxisResult<i32> {
        let steps = self.geometry.to_steps(self.home_offset);
        if !self.geometry.contains(steps) {
            return Err(AxisError::Configuration(format!(
                "home offset {} {} is outside the travel range",
                self.home_offset,
                self.kind.unit()
            )));
        }
        Ok(steps)
    }
}
