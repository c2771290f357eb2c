//! Conversions bridging `stage_config` types to `stage_core` types.
//!
//! These keep the field-by-field mapping out of the CLI.

use std::time::Duration;

use eyre::WrapErr;

use crate::config::{
    AxisSettings, CoolStepSettings, DriveSettings, Microsteps, PwmSettings, RampSettings,
    StageConfig, StageKind, StallGuardSettings,
};
use crate::error::{AxisError, Result};
use crate::geometry::{AxisGeometry, StepDrive};
use crate::homing::{HomeCondition, ReferenceSearchConfig, SearchModeSelect};
use crate::util::{DEFAULT_POLL_INTERVAL, poll_interval};

// ── Settings groups ──────────────────────────────────────────────────────────

impl From<stage_config::StageKind> for StageKind {
    fn from(k: stage_config::StageKind) -> Self {
        match k {
            stage_config::StageKind::Linear => Self::Linear,
            stage_config::StageKind::Rotary => Self::Rotary,
        }
    }
}

impl From<&stage_config::RampCfg> for RampSettings {
    fn from(c: &stage_config::RampCfg) -> Self {
        Self {
            max_velocity: c.max_velocity,
            max_acceleration: c.max_acceleration,
        }
    }
}

impl From<&stage_config::PwmCfg> for PwmSettings {
    fn from(c: &stage_config::PwmCfg) -> Self {
        Self {
            grad: c.grad,
            amplitude: c.amplitude,
            autoscale: c.autoscale,
            threshold_speed: c.threshold_speed,
        }
    }
}

impl From<&stage_config::StallGuardCfg> for StallGuardSettings {
    fn from(c: &stage_config::StallGuardCfg) -> Self {
        Self {
            filter_enable: c.filter_enable,
            threshold: c.threshold,
        }
    }
}

impl From<&stage_config::CoolStepCfg> for CoolStepSettings {
    fn from(c: &stage_config::CoolStepCfg) -> Self {
        Self {
            minimum_current: c.minimum_current,
            down_step: c.down_step,
            hysteresis: c.hysteresis,
            up_step: c.up_step,
            hysteresis_start: c.hysteresis_start,
            threshold_speed: c.threshold_speed,
        }
    }
}

// ── Homing ───────────────────────────────────────────────────────────────────

impl From<stage_config::SearchModeCfg> for SearchModeSelect {
    fn from(c: stage_config::SearchModeCfg) -> Self {
        match c {
            stage_config::SearchModeCfg::Fixed(m) => Self::Fixed(m),
            stage_config::SearchModeCfg::BySensorState {
                when_clear,
                when_asserted,
            } => Self::BySensorState {
                when_clear,
                when_asserted,
            },
        }
    }
}

/// Homing parameters; `default_poll` applies when the stage does not set its
/// own poll interval.
pub fn reference_search_from(
    c: &stage_config::HomingCfg,
    default_poll: Duration,
) -> ReferenceSearchConfig {
    let home_condition = match c.home_condition {
        stage_config::HomeConditionCfg::Switch => HomeCondition::SwitchEquals(c.home_value),
        stage_config::HomeConditionCfg::SearchStatus => {
            HomeCondition::SearchStatusEquals(c.home_value)
        }
    };
    ReferenceSearchConfig {
        mode: c.mode.into(),
        search_speed: c.search_speed,
        switch_speed: c.switch_speed,
        home_condition,
        timeout: Duration::from_millis(c.timeout_ms),
        poll_interval: c.poll_interval_ms.map_or(default_poll, poll_interval),
        cancel_search_on_home: c.cancel_search_on_home,
    }
}

// ── StageConfig ──────────────────────────────────────────────────────────────

fn stage_from(
    name: &str,
    c: &stage_config::StageCfg,
    default_poll: Duration,
) -> Result<StageConfig> {
    let microsteps = Microsteps::from_factor(u32::from(c.microsteps)).ok_or_else(|| {
        eyre::Report::new(AxisError::Configuration(format!(
            "microsteps must be a power of two in 1..=256, got {}",
            c.microsteps
        )))
    })?;
    let drive = StepDrive::new(c.full_step_angle_deg, microsteps.factor());
    let kind = StageKind::from(c.kind);
    let geometry = match kind {
        StageKind::Linear => {
            let (Some(pitch), Some(travel)) = (c.lead_pitch_mm, c.max_travel_mm) else {
                return Err(eyre::Report::new(AxisError::Configuration(
                    "linear stage needs lead_pitch_mm and max_travel_mm".into(),
                )));
            };
            AxisGeometry::linear(drive, pitch, travel)
        }
        StageKind::Rotary => AxisGeometry::rotary(drive),
    }
    .map_err(eyre::Report::new)?;

    let settings = AxisSettings {
        drive: DriveSettings {
            run_current: c.drive.run_current,
            standby_current: c.drive.standby_current,
            microsteps,
            freewheeling_mode: c.drive.freewheeling_mode,
        },
        ramp: (&c.ramp).into(),
        pwm: c.pwm.as_ref().map(Into::into),
        stallguard: c.stallguard.as_ref().map(Into::into),
        coolstep: c.coolstep.as_ref().map(Into::into),
        zero_on_init: c.zero_on_init,
    };

    // A stage without a [homing] table uses the preset for its kind.
    let homing = match &c.homing {
        Some(h) => reference_search_from(h, default_poll),
        None => {
            let mut preset = match kind {
                StageKind::Linear => ReferenceSearchConfig::linear_default(),
                StageKind::Rotary => ReferenceSearchConfig::rotary_default(),
            };
            preset.poll_interval = default_poll;
            preset
        }
    };

    Ok(StageConfig {
        name: name.to_string(),
        kind,
        axis: c.axis,
        geometry,
        home_offset: c.home_offset,
        settings,
        homing: Some(homing),
    })
}

impl TryFrom<(&str, &stage_config::StageCfg)> for StageConfig {
    type Error = eyre::Report;

    fn try_from((name, c): (&str, &stage_config::StageCfg)) -> Result<Self> {
        stage_from(name, c, DEFAULT_POLL_INTERVAL)
    }
}

/// Look up `name` in a loaded config and convert it, applying the
/// controller-wide poll interval.
pub fn stage_config(cfg: &stage_config::Config, name: &str) -> Result<StageConfig> {
    let stage = cfg.stage(name)?;
    stage_from(name, stage, poll_interval(cfg.controller.poll_interval_ms))
        .wrap_err_with(|| format!("stage '{name}'"))
}
