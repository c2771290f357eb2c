//! Caller-side completion monitoring for moves.
//!
//! `MotionController::move_to` returns as soon as the command is accepted.
//! Callers that need to block until the target is reached use
//! [`wait_until_reached`], which bounds the wait and stops the axis when the
//! bound is exceeded.

use std::time::Duration;

use stage_traits::Clock;

use crate::error::Result;
use crate::stage::StepperMotor;
use crate::util::duration_ms;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    Reached { position: f64, elapsed: Duration },
    /// The axis was stopped after `elapsed` exceeded the timeout.
    TimedOut { position: f64, elapsed: Duration },
}

impl MoveOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(self, Self::Reached { .. })
    }

    pub fn position(&self) -> f64 {
        match self {
            Self::Reached { position, .. } | Self::TimedOut { position, .. } => *position,
        }
    }
}

/// Poll `is_position_reached` every `poll` until it holds or `timeout`
/// elapses. On timeout, issues exactly one `stop()`.
pub fn wait_until_reached<M: StepperMotor + ?Sized>(
    stage: &M,
    timeout: Duration,
    poll: Duration,
    clock: &dyn Clock,
) -> Result<MoveOutcome> {
    let start = clock.now();
    loop {
        let reached = stage.is_position_reached()?;
        let position = stage.position()?;
        let elapsed = clock.elapsed_since(start);
        tracing::debug!(position, reached, elapsed_ms = duration_ms(elapsed), "move poll");
        if reached {
            return Ok(MoveOutcome::Reached { position, elapsed });
        }
        if elapsed > timeout {
            tracing::warn!(
                position,
                timeout_ms = duration_ms(timeout),
                "move did not complete in time; stopping"
            );
            stage.stop()?;
            return Ok(MoveOutcome::TimedOut { position, elapsed });
        }
        clock.sleep(poll);
    }
}
