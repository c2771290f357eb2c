use stage_traits::AxisParameter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link timeout waiting for reply")]
    Timeout,
    #[error("invalid axis index {0}")]
    InvalidAxis(u8),
    #[error("controller rejected write to {param}: {reason}")]
    Rejected {
        param: AxisParameter,
        reason: &'static str,
    },
    #[error("link fault: {0}")]
    Fault(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
