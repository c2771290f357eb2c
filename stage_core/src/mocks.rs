//! Test and helper mocks for stage_core
//!
//! `RecordingLink` is a scriptable in-memory `MotorLink` that records every
//! call; `RecordingObserver` captures observer events.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stage_traits::{AxisParameter, LinkResult, MotionCommand, MotorLink, ReferenceSearchOp};

use crate::homing::HomingPhase;
use crate::observer::{MotionObserver, MotionWarning};

/// One call received by a `RecordingLink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCall {
    Set {
        axis: u8,
        param: AxisParameter,
        value: i32,
    },
    Get {
        axis: u8,
        param: AxisParameter,
    },
    Motion {
        axis: u8,
        command: MotionCommand,
    },
    Search {
        axis: u8,
        op: ReferenceSearchOp,
    },
}

/// Call shape used to match calls for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Set(AxisParameter),
    Get(AxisParameter),
    Rotate,
    MoveTo,
    Stop,
    Search(ReferenceSearchOp),
}

impl LinkCall {
    pub fn kind(&self) -> CallKind {
        match *self {
            Self::Set { param, .. } => CallKind::Set(param),
            Self::Get { param, .. } => CallKind::Get(param),
            Self::Motion { command, .. } => match command {
                MotionCommand::Rotate { .. } => CallKind::Rotate,
                MotionCommand::MoveTo { .. } => CallKind::MoveTo,
                MotionCommand::Stop => CallKind::Stop,
            },
            Self::Search { op, .. } => CallKind::Search(op),
        }
    }
}

#[derive(Debug)]
struct FailRule {
    kind: CallKind,
    /// Matching calls allowed to succeed before failures start.
    after: usize,
    seen: usize,
    message: &'static str,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<LinkCall>,
    registers: HashMap<AxisParameter, i32>,
    scripted_reads: HashMap<AxisParameter, VecDeque<i32>>,
    scripted_status: VecDeque<i32>,
    idle_status: Option<i32>,
    failures: Vec<FailRule>,
}

impl Inner {
    fn check(&mut self, kind: CallKind) -> LinkResult<()> {
        for rule in self.failures.iter_mut().filter(|r| r.kind == kind) {
            rule.seen += 1;
            if rule.seen > rule.after {
                return Err(rule.message.into());
            }
        }
        Ok(())
    }
}

/// Scriptable spy link. Clones share state, so a test can keep one clone for
/// assertions while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Preset a register value returned by reads.
    pub fn with_register(self, param: AxisParameter, value: i32) -> Self {
        self.lock().registers.insert(param, value);
        self
    }

    /// Successive reads of `param` return `values`, then fall back to the
    /// register value.
    pub fn script_reads(self, param: AxisParameter, values: impl IntoIterator<Item = i32>) -> Self {
        self.lock()
            .scripted_reads
            .entry(param)
            .or_default()
            .extend(values);
        self
    }

    /// Successive `reference_search(Status)` replies; afterwards the link
    /// reports a running search (1) unless `with_idle_status` was set.
    pub fn script_search_status(self, values: impl IntoIterator<Item = i32>) -> Self {
        self.lock().scripted_status.extend(values);
        self
    }

    pub fn with_idle_status(self, status: i32) -> Self {
        self.lock().idle_status = Some(status);
        self
    }

    /// Every matching call fails.
    pub fn fail(self, kind: CallKind, message: &'static str) -> Self {
        self.fail_after(kind, 0, message)
    }

    /// The first `after` matching calls succeed, the rest fail.
    pub fn fail_after(self, kind: CallKind, after: usize, message: &'static str) -> Self {
        self.lock().failures.push(FailRule {
            kind,
            after,
            seen: 0,
            message,
        });
        self
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.lock().calls.iter().filter(|c| c.kind() == kind).count()
    }

    /// Motion commands in the order received.
    pub fn motions(&self) -> Vec<MotionCommand> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LinkCall::Motion { command, .. } => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// Register writes in the order received.
    pub fn writes(&self) -> Vec<(AxisParameter, i32)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LinkCall::Set { param, value, .. } => Some((*param, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn register(&self, param: AxisParameter) -> Option<i32> {
        self.lock().registers.get(&param).copied()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl MotorLink for RecordingLink {
    fn set_parameter(&self, axis: u8, param: AxisParameter, value: i32) -> LinkResult<()> {
        let mut inner = self.lock();
        inner.calls.push(LinkCall::Set { axis, param, value });
        inner.check(CallKind::Set(param))?;
        inner.registers.insert(param, value);
        Ok(())
    }

    fn get_parameter(&self, axis: u8, param: AxisParameter) -> LinkResult<i32> {
        let mut inner = self.lock();
        inner.calls.push(LinkCall::Get { axis, param });
        inner.check(CallKind::Get(param))?;
        if let Some(v) = inner.scripted_reads.get_mut(&param).and_then(VecDeque::pop_front) {
            return Ok(v);
        }
        Ok(inner.registers.get(&param).copied().unwrap_or(0))
    }

    fn motion(&self, axis: u8, command: MotionCommand) -> LinkResult<()> {
        let mut inner = self.lock();
        let call = LinkCall::Motion { axis, command };
        inner.calls.push(call);
        inner.check(call.kind())?;
        if let MotionCommand::MoveTo { position } = command {
            inner.registers.insert(AxisParameter::TargetPosition, position);
        }
        Ok(())
    }

    fn reference_search(&self, axis: u8, op: ReferenceSearchOp) -> LinkResult<i32> {
        let mut inner = self.lock();
        inner.calls.push(LinkCall::Search { axis, op });
        inner.check(CallKind::Search(op))?;
        match op {
            ReferenceSearchOp::Status => Ok(inner
                .scripted_status
                .pop_front()
                .or(inner.idle_status)
                .unwrap_or(1)),
            ReferenceSearchOp::Start | ReferenceSearchOp::Stop => Ok(0),
        }
    }
}

/// An event captured by `RecordingObserver`.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Warning(MotionWarning),
    StateChange {
        axis: u8,
        from: HomingPhase,
        to: HomingPhase,
    },
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn warnings(&self) -> Vec<MotionWarning> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Warning(w) => Some(w),
                ObservedEvent::StateChange { .. } => None,
            })
            .collect()
    }

    /// Phases entered, in order.
    pub fn phases(&self) -> Vec<HomingPhase> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::StateChange { to, .. } => Some(to),
                ObservedEvent::Warning(_) => None,
            })
            .collect()
    }

    fn push(&self, event: ObservedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl MotionObserver for RecordingObserver {
    fn on_warning(&self, warning: &MotionWarning) {
        self.push(ObservedEvent::Warning(warning.clone()));
    }

    fn on_state_change(&self, axis: u8, from: HomingPhase, to: HomingPhase) {
        self.push(ObservedEvent::StateChange { axis, from, to });
    }
}
