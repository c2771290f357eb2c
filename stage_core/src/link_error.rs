//! Maps `Box<dyn Error>` from the link boundary to typed `AxisError`.
//!
//! `stage_traits::MotorLink` returns boxed errors so any transport can plug
//! in; this module converts them, with an optional feature-gated path for
//! precise `stage_hardware::error::LinkError` downcasting.

use crate::error::AxisError;

/// Map a link-boundary error to a typed `AxisError`.
///
/// Attempts to downcast known link error types first, then falls back
/// to string-based heuristics.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> AxisError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(le) = e.downcast_ref::<stage_hardware::error::LinkError>() {
            return match le {
                stage_hardware::error::LinkError::Timeout => AxisError::LinkTimeout,
                other => AxisError::Link(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        AxisError::LinkTimeout
    } else {
        AxisError::Link(s)
    }
}
