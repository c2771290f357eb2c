//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Default bound for `--wait` on moves.
pub const DEFAULT_MOVE_TIMEOUT_MS: u64 = 30_000;

#[derive(Parser, Debug)]
#[command(name = "stage", version, about = "Stepper stage control CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/stage_config.toml")]
    pub config: PathBuf,

    /// Log and print results as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Options shared by `move-to` and `move-by`.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct MoveOpts {
    /// Maximum velocity for this move (controller units)
    #[arg(long, value_name = "V")]
    pub velocity: Option<u32>,
    /// Block until the target is reached
    #[arg(long, action = ArgAction::SetTrue)]
    pub wait: bool,
    /// Bound for --wait; the axis is stopped when exceeded
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_MOVE_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move to an absolute physical position (mm or degrees)
    MoveTo {
        /// Stage name as configured under [stages.<name>]
        #[arg(long)]
        stage: String,
        #[arg(allow_negative_numbers = true)]
        position: f64,
        #[command(flatten)]
        opts: MoveOpts,
    },
    /// Move relative to the current position
    MoveBy {
        #[arg(long)]
        stage: String,
        #[arg(allow_negative_numbers = true)]
        delta: f64,
        #[command(flatten)]
        opts: MoveOpts,
    },
    /// Rotate continuously; the sign of the velocity selects direction
    Rotate {
        #[arg(long)]
        stage: String,
        #[arg(allow_negative_numbers = true)]
        velocity: i32,
    },
    /// Stop the axis
    Stop {
        #[arg(long)]
        stage: String,
    },
    /// Run the configured reference search
    Home {
        #[arg(long)]
        stage: String,
        /// Override the configured homing timeout
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
    /// Print the current physical position
    Position {
        #[arg(long)]
        stage: String,
    },
    /// Apply drive settings (and zero the counter when `zero_on_init`)
    Init {
        #[arg(long)]
        stage: String,
    },
    /// Initialize every configured stage and read back its position
    SelfCheck,
}

impl Commands {
    /// Name used in JSON output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveTo { .. } => "move-to",
            Self::MoveBy { .. } => "move-by",
            Self::Rotate { .. } => "rotate",
            Self::Stop { .. } => "stop",
            Self::Home { .. } => "home",
            Self::Position { .. } => "position",
            Self::Init { .. } => "init",
            Self::SelfCheck => "self-check",
        }
    }
}
