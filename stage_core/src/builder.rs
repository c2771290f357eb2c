//! Type-state builder for `AxisController`.
//!
//! The builder enforces at compile time that a link and a stage configuration
//! are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use stage_traits::clock::{Clock, MonotonicClock};
use stage_traits::MotorLink;

use crate::config::StageConfig;
use crate::error::{BuildError, Result};
use crate::motion::{Axis, MotionController};
use crate::observer::{MotionObserver, TracingObserver};
use crate::stage::AxisController;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `AxisController`. All fields are validated on `build()`.
pub struct AxisControllerBuilder<L, K, S> {
    link: Option<L>,
    stage: Option<StageConfig>,
    observer: Option<Arc<dyn MotionObserver>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _k: PhantomData<K>,
    _s: PhantomData<S>,
}

impl<L> Default for AxisControllerBuilder<L, Missing, Missing> {
    fn default() -> Self {
        Self {
            link: None,
            stage: None,
            observer: None,
            clock: None,
            _k: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<L: MotorLink> AxisController<L> {
    /// Start building an `AxisController`.
    pub fn builder() -> AxisControllerBuilder<L, Missing, Missing> {
        AxisControllerBuilder::default()
    }
}

/// Validate the stage and assemble the controller.
///
/// Single source of truth for validation, shared by `try_build()` and
/// `build_axis()`.
fn validate_and_build<L: MotorLink>(
    link: L,
    stage: StageConfig,
    observer: Option<Arc<dyn MotionObserver>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<AxisController<L>> {
    if stage.name.trim().is_empty() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "stage name must not be empty",
        )));
    }
    if let Some(h) = &stage.homing {
        h.validate()
            .map_err(eyre::Report::new)
            .map_err(|e| e.wrap_err(format!("stage '{}' homing", stage.name)))?;
    }
    stage
        .home_offset_steps()
        .map_err(eyre::Report::new)
        .map_err(|e| e.wrap_err(format!("stage '{}' home offset", stage.name)))?;

    let observer = observer.unwrap_or_else(|| Arc::new(TracingObserver));
    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    let axis = Axis {
        index: stage.axis,
        geometry: stage.geometry,
    };
    let motion = MotionController::new(link, axis).with_observer(observer);

    tracing::debug!(
        stage = %stage.name,
        axis = stage.axis,
        min_steps = stage.geometry.min_steps(),
        max_steps = stage.geometry.max_steps(),
        "axis controller built"
    );
    Ok(AxisController {
        stage,
        motion,
        clock,
    })
}

impl<L: MotorLink, K, S> AxisControllerBuilder<L, K, S> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<AxisController<L>> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let stage = self
            .stage
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStage))?;
        validate_and_build(link, stage, self.observer, self.clock)
    }
}

/// Chainable setters that do not affect type-state.
impl<L, K, S> AxisControllerBuilder<L, K, S> {
    pub fn with_observer(mut self, observer: Arc<dyn MotionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<L, S> AxisControllerBuilder<L, Missing, S> {
    pub fn with_link(self, link: L) -> AxisControllerBuilder<L, Set, S> {
        AxisControllerBuilder {
            link: Some(link),
            stage: self.stage,
            observer: self.observer,
            clock: self.clock,
            _k: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<L, K> AxisControllerBuilder<L, K, Missing> {
    pub fn with_stage(self, stage: StageConfig) -> AxisControllerBuilder<L, K, Set> {
        AxisControllerBuilder {
            link: self.link,
            stage: Some(stage),
            observer: self.observer,
            clock: self.clock,
            _k: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<L: MotorLink> AxisControllerBuilder<L, Set, Set> {
    /// Validate and build. Only available when the link and stage are set.
    pub fn build(self) -> Result<AxisController<L>> {
        self.try_build()
    }
}

/// Build an `AxisController` directly from its parts.
///
/// Delegates to the shared `validate_and_build`.
pub fn build_axis<L: MotorLink>(
    link: L,
    stage: StageConfig,
    observer: Option<Arc<dyn MotionObserver>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<AxisController<L>> {
    validate_and_build(link, stage, observer, clock)
}
