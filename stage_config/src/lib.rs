#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the stage controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Stage tables are keyed by name (`[stages.delay_line]`); each maps to one
//!   axis of the controller module.
//! - Omitted `[stages.*.homing]` tables fall back to the per-kind defaults in
//!   the core presets.
use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Linear,
    Rotary,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControllerCfg {
    /// Module address on the bus.
    pub module_id: u8,
    /// Default poll interval for homing and move monitoring (ms).
    pub poll_interval_ms: u64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            module_id: 1,
            poll_interval_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DriveCfg {
    /// Run current scale (0..=255, controller units).
    pub run_current: u8,
    /// Standby current scale (0..=255).
    pub standby_current: u8,
    /// Freewheeling mode applied at standby (controller enumeration).
    pub freewheeling_mode: Option<u8>,
}

impl Default for DriveCfg {
    fn default() -> Self {
        Self {
            run_current: 8,
            standby_current: 0,
            freewheeling_mode: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RampCfg {
    pub max_velocity: u32,
    pub max_acceleration: u32,
}

impl Default for RampCfg {
    fn default() -> Self {
        Self {
            max_velocity: 30_000,
            max_acceleration: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PwmCfg {
    pub grad: u8,
    pub amplitude: u8,
    #[serde(default)]
    pub autoscale: bool,
    pub threshold_speed: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StallGuardCfg {
    #[serde(default)]
    pub filter_enable: bool,
    /// Signed sensitivity, -64..=63.
    pub threshold: i8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoolStepCfg {
    pub minimum_current: u8,
    pub down_step: u8,
    pub hysteresis: u8,
    pub up_step: u8,
    pub hysteresis_start: u8,
    #[serde(default)]
    pub threshold_speed: u32,
}

/// Reference search mode: either one fixed mode, or a mode chosen by the
/// home-sensor level observed before the search starts.
///
/// Accepts `mode = 7` or `mode = { when_clear = 8, when_asserted = 132 }`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum SearchModeCfg {
    Fixed(u8),
    BySensorState { when_clear: u8, when_asserted: u8 },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HomeConditionCfg {
    /// Poll the home switch register.
    Switch,
    /// Poll the reference-search status.
    SearchStatus,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HomingCfg {
    pub mode: SearchModeCfg,
    pub search_speed: u32,
    pub switch_speed: u32,
    pub timeout_ms: u64,
    /// Overrides `[controller] poll_interval_ms` for this stage.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    pub home_condition: HomeConditionCfg,
    /// Register/status value that means "home reached".
    #[serde(default)]
    pub home_value: i32,
    /// Issue a reference-search stop once home is confirmed.
    #[serde(default)]
    pub cancel_search_on_home: bool,
}

/// Knobs of the simulated controller backend. Ignored by real links.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationCfg {
    pub start_position_steps: i32,
    pub home_switch_steps: i32,
    /// `false` removes the switch so every search runs into its timeout.
    pub home_switch_reachable: bool,
    pub home_active_level: i32,
    pub steps_per_tick: u32,
}

impl SimulationCfg {
    /// Switch location, or `None` when it cannot be reached.
    pub fn home_switch(&self) -> Option<i32> {
        self.home_switch_reachable.then_some(self.home_switch_steps)
    }
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            start_position_steps: 0,
            home_switch_steps: 0,
            home_switch_reachable: true,
            home_active_level: 0,
            steps_per_tick: 10_000,
        }
    }
}

fn default_step_angle() -> f64 {
    1.8
}

fn default_microsteps() -> u16 {
    256
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct StageCfg {
    pub kind: StageKind,
    /// Axis index on the module.
    pub axis: u8,
    #[serde(default = "default_step_angle")]
    pub full_step_angle_deg: f64,
    /// Microstep factor (1, 2, 4, ..., 256).
    #[serde(default = "default_microsteps")]
    pub microsteps: u16,
    /// Linear only: travel per revolution.
    pub lead_pitch_mm: Option<f64>,
    /// Linear only: usable travel from the home position.
    pub max_travel_mm: Option<f64>,
    /// Physical position assigned to the home reference.
    #[serde(default)]
    pub home_offset: f64,
    /// Reset the actual-position register when the axis is initialized.
    #[serde(default = "default_true")]
    pub zero_on_init: bool,
    #[serde(default)]
    pub drive: DriveCfg,
    #[serde(default)]
    pub ramp: RampCfg,
    #[serde(default)]
    pub pwm: Option<PwmCfg>,
    #[serde(default)]
    pub stallguard: Option<StallGuardCfg>,
    #[serde(default)]
    pub coolstep: Option<CoolStepCfg>,
    #[serde(default)]
    pub homing: Option<HomingCfg>,
    #[serde(default)]
    pub simulation: SimulationCfg,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerCfg,
    #[serde(default)]
    pub logging: Logging,
    pub stages: BTreeMap<String, StageCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {:?}: {}", path, e))
}

const MICROSTEP_FACTORS: [u16; 9] = [1, 2, 4, 8, 16, 32, 64, 128, 256];

impl Config {
    /// Look up a stage by name.
    pub fn stage(&self, name: &str) -> eyre::Result<&StageCfg> {
        self.stages.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.stages.keys().map(String::as_str).collect();
            eyre::eyre!("unknown stage '{name}' (configured: {})", known.join(", "))
        })
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Controller
        if self.controller.poll_interval_ms == 0 {
            eyre::bail!("controller.poll_interval_ms must be >= 1");
        }
        if self.controller.poll_interval_ms > 60_000 {
            eyre::bail!("controller.poll_interval_ms is unreasonably large (>60s)");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        if self.stages.is_empty() {
            eyre::bail!("at least one [stages.<name>] table is required");
        }

        let mut axes = BTreeMap::new();
        for (name, stage) in &self.stages {
            if let Some(other) = axes.insert(stage.axis, name) {
                eyre::bail!(
                    "stages.{name}.axis {} is already used by stages.{other}",
                    stage.axis
                );
            }
            stage.validate(name)?;
        }
        Ok(())
    }
}

impl StageCfg {
    fn validate(&self, name: &str) -> eyre::Result<()> {
        if !(self.full_step_angle_deg.is_finite()
            && self.full_step_angle_deg > 0.0
            && self.full_step_angle_deg <= 90.0)
        {
            eyre::bail!("stages.{name}.full_step_angle_deg must be in (0, 90]");
        }
        if !MICROSTEP_FACTORS.contains(&self.microsteps) {
            eyre::bail!("stages.{name}.microsteps must be a power of two in 1..=256");
        }
        if !self.home_offset.is_finite() {
            eyre::bail!("stages.{name}.home_offset must be finite");
        }

        match self.kind {
            StageKind::Linear => {
                match self.lead_pitch_mm {
                    Some(p) if p.is_finite() && p > 0.0 => {}
                    Some(_) => eyre::bail!("stages.{name}.lead_pitch_mm must be > 0"),
                    None => eyre::bail!("stages.{name}.lead_pitch_mm is required for linear stages"),
                }
                match self.max_travel_mm {
                    Some(t) if t.is_finite() && t >= 0.0 => {}
                    Some(_) => eyre::bail!("stages.{name}.max_travel_mm must be >= 0"),
                    None => eyre::bail!("stages.{name}.max_travel_mm is required for linear stages"),
                }
            }
            StageKind::Rotary => {
                if self.lead_pitch_mm.is_some() || self.max_travel_mm.is_some() {
                    eyre::bail!(
                        "stages.{name}: lead_pitch_mm/max_travel_mm only apply to linear stages"
                    );
                }
            }
        }

        // Ramp
        if self.ramp.max_velocity == 0 {
            eyre::bail!("stages.{name}.ramp.max_velocity must be > 0");
        }
        if self.ramp.max_acceleration == 0 {
            eyre::bail!("stages.{name}.ramp.max_acceleration must be > 0");
        }

        // Tuning
        if let Some(sg) = &self.stallguard
            && !(-64..=63).contains(&sg.threshold)
        {
            eyre::bail!("stages.{name}.stallguard.threshold must be in -64..=63");
        }
        if let Some(cs) = &self.coolstep {
            if cs.minimum_current > 1 {
                eyre::bail!("stages.{name}.coolstep.minimum_current must be 0 or 1");
            }
            if cs.down_step > 3 || cs.up_step > 3 {
                eyre::bail!("stages.{name}.coolstep.down_step/up_step must be in 0..=3");
            }
            if cs.hysteresis > 15 || cs.hysteresis_start > 15 {
                eyre::bail!("stages.{name}.coolstep.hysteresis values must be in 0..=15");
            }
        }

        // Homing
        if let Some(h) = &self.homing {
            if h.search_speed == 0 {
                eyre::bail!("stages.{name}.homing.search_speed must be > 0");
            }
            if h.switch_speed == 0 {
                eyre::bail!("stages.{name}.homing.switch_speed must be > 0");
            }
            if h.timeout_ms == 0 {
                eyre::bail!("stages.{name}.homing.timeout_ms must be >= 1");
            }
            if h.timeout_ms > 10 * 60 * 1000 {
                eyre::bail!("stages.{name}.homing.timeout_ms is unreasonably large (>10min)");
            }
            if h.poll_interval_ms == Some(0) {
                eyre::bail!("stages.{name}.homing.poll_interval_ms must be >= 1");
            }
        }

        // Simulation
        if self.simulation.steps_per_tick == 0 {
            eyre::bail!("stages.{name}.simulation.steps_per_tick must be >= 1");
        }

        Ok(())
    }
}
