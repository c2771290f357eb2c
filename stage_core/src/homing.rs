//! Bounded reference search ("homing") as an explicit state machine.
//!
//! ```text
//! Idle -> SearchStarting -> Searching -> Confirming -> Homed
//!                  |            |  \           |
//!                  v            v   v          v
//!               Faulted     TimedOut Faulted  Faulted
//! ```
//!
//! Each call to [`HomingStateMachine::advance`] performs the work of exactly
//! one phase (in `Searching`: one poll and, if not done, one sleep), so tests
//! can step through a run and observe every transition. [`HomingStateMachine::run`]
//! drives it to a terminal phase.
//!
//! Recovery is local and best-effort only:
//! - timeout: exactly one `stop()`;
//! - link fault after the search may have started: exactly one
//!   `reference_search(Stop)`.
//!
//! A failed recovery command is logged and recorded but never replaces the
//! original error. Nothing is retried.

use std::time::{Duration, Instant};

use stage_traits::{AxisParameter, Clock, MotorLink, ReferenceSearchOp};

use crate::error::{AxisError, AxisResult};
use crate::motion::MotionController;
use crate::observer::MotionWarning;
use crate::util::{DEFAULT_HOMING_TIMEOUT, DEFAULT_POLL_INTERVAL, duration_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HomingPhase {
    Idle,
    SearchStarting,
    Searching,
    Confirming,
    Homed,
    TimedOut,
    Faulted,
}

impl HomingPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Homed | Self::TimedOut | Self::Faulted)
    }
}

/// How the controller's reference-search mode is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchModeSelect {
    Fixed(u8),
    /// Read the home switch before starting: 0 selects `when_clear`, any
    /// other level selects `when_asserted`.
    BySensorState { when_clear: u8, when_asserted: u8 },
}

/// Condition polled while `Searching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeCondition {
    /// `HomeSwitch` register equals the value.
    SwitchEquals(i32),
    /// `reference_search(Status)` equals the value.
    SearchStatusEquals(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSearchConfig {
    pub mode: SearchModeSelect,
    pub search_speed: u32,
    pub switch_speed: u32,
    pub home_condition: HomeCondition,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Issue `reference_search(Stop)` once home is confirmed.
    pub cancel_search_on_home: bool,
}

impl ReferenceSearchConfig {
    /// Delay line: mode 7, poll the home switch until it reads 0.
    pub fn linear_default() -> Self {
        Self {
            mode: SearchModeSelect::Fixed(7),
            search_speed: 10_000,
            switch_speed: 500,
            home_condition: HomeCondition::SwitchEquals(0),
            timeout: DEFAULT_HOMING_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel_search_on_home: false,
        }
    }

    /// Polarization paddle: mode 8, poll the search status until idle, then
    /// cancel the search.
    pub fn rotary_default() -> Self {
        Self {
            mode: SearchModeSelect::Fixed(8),
            search_speed: 5_000,
            switch_speed: 500,
            home_condition: HomeCondition::SearchStatusEquals(0),
            timeout: DEFAULT_HOMING_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel_search_on_home: true,
        }
    }

    pub fn validate(&self) -> AxisResult<()> {
        if self.search_speed == 0 || self.switch_speed == 0 {
            return Err(AxisError::Configuration(
                "homing speeds must be > 0".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(AxisError::Configuration(
                "homing timeout must be > 0".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(AxisError::Configuration(
                "homing poll interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// State of one homing invocation. Discarded when the run ends.
#[derive(Debug, Clone)]
pub struct HomingRun {
    phase: HomingPhase,
    started_at: Option<Instant>,
    elapsed: Duration,
    mode: Option<u8>,
    last_sensor: Option<i32>,
    polls: u32,
    error: Option<AxisError>,
    cancel_error: Option<AxisError>,
    recovery_error: Option<AxisError>,
}

impl HomingRun {
    fn new() -> Self {
        Self {
            phase: HomingPhase::Idle,
            started_at: None,
            elapsed: Duration::ZERO,
            mode: None,
            last_sensor: None,
            polls: 0,
            error: None,
            cancel_error: None,
            recovery_error: None,
        }
    }

    pub fn phase(&self) -> HomingPhase {
        self.phase
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Time from start to the last poll (or to the terminal transition).
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Search mode written to the controller, once resolved.
    pub fn mode(&self) -> Option<u8> {
        self.mode
    }

    /// Last value read for the home condition.
    pub fn last_sensor(&self) -> Option<i32> {
        self.last_sensor
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn error(&self) -> Option<&AxisError> {
        self.error.as_ref()
    }

    /// Failure of the best-effort search cancellation after a fault.
    pub fn cancel_error(&self) -> Option<&AxisError> {
        self.cancel_error.as_ref()
    }

    /// Failure of the stop issued on timeout.
    pub fn recovery_error(&self) -> Option<&AxisError> {
        self.recovery_error.as_ref()
    }
}

/// Summary of a successful homing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomingReport {
    pub axis: u8,
    pub mode: u8,
    pub polls: u32,
    pub elapsed: Duration,
    /// Value written to ActualPosition.
    pub home_steps: i32,
}

pub struct HomingStateMachine<'a, L> {
    motion: &'a MotionController<L>,
    clock: &'a dyn Clock,
    config: ReferenceSearchConfig,
    home_steps: i32,
    run: HomingRun,
}

impl<'a, L: MotorLink> HomingStateMachine<'a, L> {
    /// `home_steps` is the step count ActualPosition is set to once home is
    /// confirmed.
    pub fn new(
        motion: &'a MotionController<L>,
        clock: &'a dyn Clock,
        config: ReferenceSearchConfig,
        home_steps: i32,
    ) -> Self {
        Self {
            motion,
            clock,
            config,
            home_steps,
            run: HomingRun::new(),
        }
    }

    pub fn phase(&self) -> HomingPhase {
        self.run.phase
    }

    pub fn run_state(&self) -> &HomingRun {
        &self.run
    }

    pub fn config(&self) -> &ReferenceSearchConfig {
        &self.config
    }

    /// Leave `Idle` and stamp the start time. No-op in any other phase.
    pub fn begin(&mut self) -> HomingPhase {
        if self.run.phase == HomingPhase::Idle {
            self.run.started_at = Some(self.clock.now());
            tracing::info!(
                axis = self.motion.axis(),
                timeout_ms = duration_ms(self.config.timeout),
                "homing start"
            );
            self.transition(HomingPhase::SearchStarting);
        }
        self.run.phase
    }

    /// Perform the work of the current phase and return the phase reached.
    /// Terminal phases are returned unchanged.
    pub fn advance(&mut self) -> HomingPhase {
        match self.run.phase {
            HomingPhase::Idle => {
                self.begin();
            }
            HomingPhase::SearchStarting => self.start_search(),
            HomingPhase::Searching => self.poll_once(),
            HomingPhase::Confirming => self.confirm(),
            HomingPhase::Homed | HomingPhase::TimedOut | HomingPhase::Faulted => {}
        }
        self.run.phase
    }

    /// Drive the run to a terminal phase.
    pub fn run(&mut self) -> HomingPhase {
        while !self.run.phase.is_terminal() {
            self.advance();
        }
        self.run.phase
    }

    /// Consume the machine, mapping the terminal phase to a result.
    pub fn into_result(self) -> AxisResult<HomingReport> {
        let run = self.run;
        match run.phase {
            HomingPhase::Homed => Ok(HomingReport {
                axis: self.motion.axis(),
                mode: run.mode.unwrap_or_default(),
                polls: run.polls,
                elapsed: run.elapsed,
                home_steps: self.home_steps,
            }),
            HomingPhase::TimedOut => Err(AxisError::HomingTimeout {
                elapsed_ms: duration_ms(run.elapsed),
                timeout_ms: duration_ms(self.config.timeout),
            }),
            HomingPhase::Faulted => Err(AxisError::HomingFaulted {
                error: Box::new(run.error.unwrap_or_else(|| {
                    AxisError::Configuration("homing faulted without a cause".into())
                })),
                cancel_error: run.cancel_error.map(Box::new),
            }),
            phase => Err(AxisError::Configuration(format!(
                "homing run not finished (phase {phase:?})"
            ))),
        }
    }

    fn start_search(&mut self) {
        let mode = match self.resolve_mode() {
            Ok(m) => m,
            Err(e) => return self.fault(e, false),
        };
        self.run.mode = Some(mode);
        let writes = [
            (AxisParameter::ReferenceSearchMode, i32::from(mode)),
            (
                AxisParameter::ReferenceSearchSpeed,
                i32::try_from(self.config.search_speed).unwrap_or(i32::MAX),
            ),
            (
                AxisParameter::RefSwitchSpeed,
                i32::try_from(self.config.switch_speed).unwrap_or(i32::MAX),
            ),
        ];
        for (param, value) in writes {
            if let Err(e) = self.motion.write(param, value) {
                // Nothing has moved yet; no search to cancel.
                return self.fault(e, false);
            }
        }
        if let Err(e) = self.motion.reference_search(ReferenceSearchOp::Start) {
            return self.fault(e, true);
        }
        tracing::debug!(axis = self.motion.axis(), mode, "reference search started");
        self.transition(HomingPhase::Searching);
    }

    fn resolve_mode(&self) -> AxisResult<u8> {
        match self.config.mode {
            SearchModeSelect::Fixed(m) => Ok(m),
            SearchModeSelect::BySensorState {
                when_clear,
                when_asserted,
            } => {
                let level = self.motion.read(AxisParameter::HomeSwitch)?;
                tracing::debug!(axis = self.motion.axis(), level, "initial home sensor");
                Ok(if level == 0 { when_clear } else { when_asserted })
            }
        }
    }

    fn poll_once(&mut self) {
        let value = match self.config.home_condition {
            HomeCondition::SwitchEquals(_) => self.motion.read(AxisParameter::HomeSwitch),
            HomeCondition::SearchStatusEquals(_) => {
                self.motion.reference_search(ReferenceSearchOp::Status)
            }
        };
        self.run.polls = self.run.polls.saturating_add(1);
        self.update_elapsed();
        let value = match value {
            Ok(v) => v,
            Err(e) => return self.fault(e, true),
        };
        self.run.last_sensor = Some(value);
        tracing::trace!(
            axis = self.motion.axis(),
            value,
            polls = self.run.polls,
            "homing poll"
        );

        let expected = match self.config.home_condition {
            HomeCondition::SwitchEquals(v) | HomeCondition::SearchStatusEquals(v) => v,
        };
        if value == expected {
            self.transition(HomingPhase::Confirming);
            return;
        }
        if self.run.elapsed > self.config.timeout {
            self.time_out();
            return;
        }
        self.clock.sleep(self.config.poll_interval);
    }

    fn time_out(&mut self) {
        let axis = self.motion.axis();
        self.motion.observer().on_warning(&MotionWarning::HomingTimedOut {
            axis,
            elapsed_ms: duration_ms(self.run.elapsed),
            timeout_ms: duration_ms(self.config.timeout),
        });
        if let Err(e) = self.motion.stop() {
            self.motion.observer().on_warning(&MotionWarning::RecoveryFailed {
                axis,
                error: e.to_string(),
            });
            self.run.recovery_error = Some(e);
        }
        self.transition(HomingPhase::TimedOut);
    }

    fn confirm(&mut self) {
        if self.config.cancel_search_on_home {
            if let Err(e) = self.motion.reference_search(ReferenceSearchOp::Stop) {
                // The cancellation itself failed; do not issue a second one.
                return self.fault(e, false);
            }
        }
        if let Err(e) = self.motion.set_actual_position(self.home_steps) {
            let cancel = !self.config.cancel_search_on_home;
            return self.fault(e, cancel);
        }
        self.update_elapsed();
        tracing::info!(
            axis = self.motion.axis(),
            home_steps = self.home_steps,
            polls = self.run.polls,
            elapsed_ms = duration_ms(self.run.elapsed),
            "homed"
        );
        self.transition(HomingPhase::Homed);
    }

    fn fault(&mut self, error: AxisError, cancel_search: bool) {
        let axis = self.motion.axis();
        tracing::error!(axis, error = %error, phase = ?self.run.phase, "homing fault");
        if cancel_search {
            if let Err(cancel) = self.motion.reference_search(ReferenceSearchOp::Stop) {
                self.motion.observer().on_warning(&MotionWarning::RecoveryFailed {
                    axis,
                    error: cancel.to_string(),
                });
                self.run.cancel_error = Some(cancel);
            }
        }
        self.update_elapsed();
        self.run.error = Some(error);
        self.transition(HomingPhase::Faulted);
    }

    fn update_elapsed(&mut self) {
        if let Some(start) = self.run.started_at {
            self.run.elapsed = self.clock.elapsed_since(start);
        }
    }

    fn transition(&mut self, to: HomingPhase) {
        let from = self.run.phase;
        if from == to {
            return;
        }
        self.run.phase = to;
        self.motion
            .observer()
            .on_state_change(self.motion.axis(), from, to);
    }
}
