//! Subcommand execution: backend assembly, stage lookup and result rendering.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use stage_config::Config;
use stage_core::conversions;
use stage_core::error::Result;
use stage_core::util::{duration_ms, poll_interval};
use stage_core::{AxisController, HomingReport, MoveOutcome, MoveReport, StepperMotor};
use stage_hardware::{FaultPlan, SimulatedController};
use stage_traits::MonotonicClock;

use crate::cli::{Commands, MoveOpts};

/// Inject a link timeout after this many successful controller calls.
pub const ENV_SIM_FAIL_AFTER: &str = "STAGE_SIM_FAIL_AFTER";
/// Make every home switch unreachable, whatever `home_switch_reachable` says.
pub const ENV_SIM_NO_HOME: &str = "STAGE_SIM_NO_HOME";

pub type Link = Arc<SimulatedController>;
pub type Stage = AxisController<Link>;

/// A `--wait` move that did not complete in time. The axis has been stopped.
#[derive(Debug, thiserror::Error)]
#[error("move did not complete within {timeout_ms} ms; stopped at {position}")]
pub struct MoveTimedOut {
    pub timeout_ms: u64,
    pub position: f64,
}

/// Result of one subcommand, printable as text or one JSON line.
#[derive(Debug)]
pub enum Outcome {
    Moved {
        stage: String,
        unit: &'static str,
        report: MoveReport,
        waited: Option<MoveOutcome>,
    },
    Rotating {
        stage: String,
        velocity: i32,
    },
    Stopped {
        stage: String,
    },
    Homed {
        stage: String,
        unit: &'static str,
        report: HomingReport,
        position: f64,
    },
    Position {
        stage: String,
        unit: &'static str,
        position: f64,
        reached: bool,
    },
    Initialized {
        stage: String,
        unit: &'static str,
        position: f64,
    },
    SelfCheck {
        stages: Vec<(String, f64, &'static str)>,
    },
}

impl Outcome {
    pub fn to_json(&self, command: &str) -> Value {
        match self {
            Self::Moved {
                stage,
                unit,
                report,
                waited,
            } => json!({
                "command": command,
                "stage": stage,
                "unit": unit,
                "requested": report.requested,
                "target": report.position,
                "steps": report.steps,
                "clamped": report.was_clamped(),
                "reached": waited.as_ref().map(MoveOutcome::is_reached),
                "position": waited.as_ref().map(MoveOutcome::position),
            }),
            Self::Rotating { stage, velocity } => {
                json!({ "command": command, "stage": stage, "velocity": velocity })
            }
            Self::Stopped { stage } => json!({ "command": command, "stage": stage }),
            Self::Homed {
                stage,
                unit,
                report,
                position,
            } => json!({
                "command": command,
                "stage": stage,
                "unit": unit,
                "mode": report.mode,
                "polls": report.polls,
                "elapsed_ms": duration_ms(report.elapsed),
                "home_steps": report.home_steps,
                "position": position,
            }),
            Self::Position {
                stage,
                unit,
                position,
                reached,
            } => json!({
                "command": command,
                "stage": stage,
                "unit": unit,
                "position": position,
                "reached": reached,
            }),
            Self::Initialized {
                stage,
                unit,
                position,
            } => json!({
                "command": command,
                "stage": stage,
                "unit": unit,
                "position": position,
            }),
            Self::SelfCheck { stages } => {
                let list: Vec<Value> = stages
                    .iter()
                    .map(|(name, position, unit)| {
                        json!({ "stage": name, "position": position, "unit": unit })
                    })
                    .collect();
                json!({ "command": command, "ok": true, "stages": list })
            }
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Moved {
                stage,
                unit,
                report,
                waited,
            } => {
                write!(
                    f,
                    "{stage}: target {:.4} {unit} ({} steps)",
                    report.position, report.steps
                )?;
                if report.was_clamped() {
                    write!(f, ", clamped from {} {unit}", report.requested)?;
                }
                if let Some(MoveOutcome::Reached { position, elapsed }) = waited {
                    write!(f, "; reached {position:.4} {unit} in {} ms", elapsed.as_millis())?;
                }
                Ok(())
            }
            Self::Rotating { stage, velocity } => write!(f, "{stage}: rotating at {velocity}"),
            Self::Stopped { stage } => write!(f, "{stage}: stopped"),
            Self::Homed {
                stage,
                unit,
                report,
                position,
            } => write!(
                f,
                "{stage}: homed (mode {}, {} polls, {} ms); position {position:.4} {unit}",
                report.mode,
                report.polls,
                report.elapsed.as_millis()
            ),
            Self::Position {
                stage,
                unit,
                position,
                reached,
            } => {
                let state = if *reached { "at target" } else { "moving" };
                write!(f, "{stage}: {position:.4} {unit} ({state})")
            }
            Self::Initialized {
                stage,
                unit,
                position,
            } => write!(f, "{stage}: initialized; position {position:.4} {unit}"),
            Self::SelfCheck { stages } => {
                write!(f, "Self-check OK")?;
                for (name, position, unit) in stages {
                    write!(f, "\n  {name}: {position:.4} {unit}")?;
                }
                Ok(())
            }
        }
    }
}

/// Build the simulated module from the per-stage `[simulation]` tables and
/// the test environment knobs.
pub fn simulated_backend(cfg: &Config) -> Link {
    let steps_per_tick = cfg
        .stages
        .values()
        .map(|s| s.simulation.steps_per_tick)
        .min()
        .unwrap_or(10_000);
    let fail_after_calls = std::env::var(ENV_SIM_FAIL_AFTER)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok());
    let no_home = std::env::var_os(ENV_SIM_NO_HOME).is_some();

    let mut sim = SimulatedController::new()
        .with_module_id(cfg.controller.module_id)
        .with_steps_per_tick(steps_per_tick)
        .with_faults(FaultPlan {
            fail_after_calls,
            ..FaultPlan::default()
        });
    for stage in cfg.stages.values() {
        let switch = if no_home {
            None
        } else {
            stage.simulation.home_switch()
        };
        sim = sim
            .with_position(stage.axis, stage.simulation.start_position_steps)
            .with_home_switch(stage.axis, switch)
            .with_home_active_level(stage.axis, stage.simulation.home_active_level);
    }
    tracing::debug!(
        module_id = sim.module_id(),
        steps_per_tick,
        ?fail_after_calls,
        no_home,
        "simulated backend ready"
    );
    Arc::new(sim)
}

/// Look up and build one stage. Nothing is written to the controller, so the
/// position counter and any homed reference survive.
pub fn open_stage(cfg: &Config, link: &Link, name: &str) -> Result<Stage> {
    let stage = conversions::stage_config(cfg, name)?;
    AxisController::builder()
        .with_link(Arc::clone(link))
        .with_stage(stage)
        .build()
}

/// Open one stage and apply its drive settings. Zeroes the counter when the
/// stage has `zero_on_init` set.
pub fn init_stage(cfg: &Config, link: &Link, name: &str) -> Result<Stage> {
    let stage = open_stage(cfg, link, name)?;
    stage.initialize()?;
    Ok(stage)
}

/// Arm Ctrl-C to stop the axis. Only the first stage opened gets the handler.
fn arm_interrupt(stage: &Stage) {
    let handle = stage.stop_handle();
    let name = stage.name().to_string();
    let armed = ctrlc::set_handler(move || {
        if let Err(e) = handle.stop() {
            tracing::error!(stage = %name, error = %e, "stop on interrupt failed");
        } else {
            tracing::warn!(stage = %name, "interrupted; axis stopped");
        }
        std::process::exit(130);
    });
    if let Err(e) = armed {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
}

fn move_and_wait(
    stage: &Stage,
    cfg: &Config,
    opts: MoveOpts,
    issue: impl FnOnce(&Stage) -> Result<MoveReport>,
) -> Result<Outcome> {
    let report = issue(stage)?;
    let waited = if opts.wait {
        let poll = poll_interval(cfg.controller.poll_interval_ms);
        let timeout = Duration::from_millis(opts.timeout_ms);
        let outcome =
            stage_core::wait_until_reached(stage, timeout, poll, &MonotonicClock::new())?;
        if let MoveOutcome::TimedOut { position, .. } = outcome {
            return Err(eyre::Report::new(MoveTimedOut {
                timeout_ms: opts.timeout_ms,
                position,
            })
            .wrap_err(format!("stage '{}'", stage.name())));
        }
        Some(outcome)
    } else {
        None
    };
    Ok(Outcome::Moved {
        stage: stage.name().to_string(),
        unit: stage.unit(),
        report,
        waited,
    })
}

/// Execute one subcommand against `link`.
pub fn run(cmd: &Commands, cfg: &Config, link: &Link) -> Result<Outcome> {
    match cmd {
        Commands::MoveTo {
            stage,
            position,
            opts,
        } => {
            let stage = open_stage(cfg, link, stage)?;
            arm_interrupt(&stage);
            move_and_wait(&stage, cfg, *opts, |s| s.move_to(*position, opts.velocity))
        }
        Commands::MoveBy { stage, delta, opts } => {
            let stage = open_stage(cfg, link, stage)?;
            arm_interrupt(&stage);
            move_and_wait(&stage, cfg, *opts, |s| s.move_by(*delta, opts.velocity))
        }
        Commands::Rotate { stage, velocity } => {
            let stage = open_stage(cfg, link, stage)?;
            stage.rotate(*velocity)?;
            Ok(Outcome::Rotating {
                stage: stage.name().to_string(),
                velocity: *velocity,
            })
        }
        Commands::Stop { stage } => {
            let stage = open_stage(cfg, link, stage)?;
            stage.stop()?;
            Ok(Outcome::Stopped {
                stage: stage.name().to_string(),
            })
        }
        Commands::Home { stage, timeout_ms } => {
            let stage = open_stage(cfg, link, stage)?;
            arm_interrupt(&stage);
            let report = match (*timeout_ms, stage.stage_config().homing.clone()) {
                (Some(ms), Some(mut homing)) => {
                    homing.timeout = Duration::from_millis(ms);
                    stage.go_to_home_position_with(homing)?
                }
                _ => stage.go_to_home_position()?,
            };
            Ok(Outcome::Homed {
                stage: stage.name().to_string(),
                unit: stage.unit(),
                position: stage.position()?,
                report,
            })
        }
        Commands::Position { stage } => {
            let stage = open_stage(cfg, link, stage)?;
            Ok(Outcome::Position {
                stage: stage.name().to_string(),
                unit: stage.unit(),
                position: stage.position()?,
                reached: stage.is_position_reached()?,
            })
        }
        Commands::Init { stage } => {
            let stage = init_stage(cfg, link, stage)?;
            Ok(Outcome::Initialized {
                stage: stage.name().to_string(),
                unit: stage.unit(),
                position: stage.position()?,
            })
        }
        Commands::SelfCheck => {
            let mut stages = Vec::with_capacity(cfg.stages.len());
            for name in cfg.stages.keys() {
                let stage = init_stage(cfg, link, name)?;
                stages.push((name.clone(), stage.position()?, stage.unit()));
            }
            Ok(Outcome::SelfCheck { stages })
        }
    }
}
