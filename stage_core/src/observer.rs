//! Motion events reported to an injected observer.

use crate::geometry::LimitSide;
use crate::homing::HomingPhase;

/// Non-fatal conditions raised while commanding an axis.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionWarning {
    /// A target was outside the travel range and was replaced by the limit.
    LimitClamped {
        axis: u8,
        requested_steps: i32,
        issued_steps: i32,
        limit: LimitSide,
    },
    /// A homing run exceeded its timeout; the axis has been stopped.
    HomingTimedOut {
        axis: u8,
        elapsed_ms: u64,
        timeout_ms: u64,
    },
    /// A best-effort recovery command (stop or search cancel) failed.
    RecoveryFailed { axis: u8, error: String },
}

/// Receives warnings and homing phase transitions.
///
/// Implementations must be cheap: they are called inline from the motion path.
pub trait MotionObserver: Send + Sync {
    fn on_warning(&self, warning: &MotionWarning);
    fn on_state_change(&self, axis: u8, from: HomingPhase, to: HomingPhase);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MotionObserver for TracingObserver {
    fn on_warning(&self, warning: &MotionWarning) {
        match warning {
            MotionWarning::LimitClamped {
                axis,
                requested_steps,
                issued_steps,
                limit,
            } => tracing::warn!(
                axis,
                requested_steps,
                issued_steps,
                ?limit,
                "target outside travel range; clamped"
            ),
            MotionWarning::HomingTimedOut {
                axis,
                elapsed_ms,
                timeout_ms,
            } => tracing::warn!(axis, elapsed_ms, timeout_ms, "homing timed out"),
            MotionWarning::RecoveryFailed { axis, error } => {
                tracing::error!(axis, error = %error, "recovery command failed");
            }
        }
    }

    fn on_state_change(&self, axis: u8, from: HomingPhase, to: HomingPhase) {
        tracing::debug!(axis, ?from, ?to, "homing phase");
    }
}
