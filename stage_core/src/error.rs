use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AxisError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("link error: {0}")]
    Link(String),
    #[error("link timeout")]
    LinkTimeout,
    #[error("homing timed out after {elapsed_ms} ms (limit {timeout_ms} ms); axis stopped")]
    HomingTimeout { elapsed_ms: u64, timeout_ms: u64 },
    #[error("homing faulted: {error}{}", cancel_note(.cancel_error))]
    HomingFaulted {
        error: Box<AxisError>,
        cancel_error: Option<Box<AxisError>>,
    },
}

fn cancel_note(cancel_error: &Option<Box<AxisError>>) -> String {
    match cancel_error {
        Some(e) => format!(" (cancelling the search also failed: {e})"),
        None => String::new(),
    }
}

impl AxisError {
    /// True for transport failures, including timeouts.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link(_) | Self::LinkTimeout)
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motor link")]
    MissingLink,
    #[error("missing stage configuration")]
    MissingStage,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Typed result for operations below the facade (geometry, motion, homing).
pub type AxisResult<T> = std::result::Result<T, AxisError>;

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
