//! Human-readable error descriptions, exit codes and structured JSON errors.

use stage_core::error::{AxisError, BuildError};

use crate::commands::MoveTimedOut;

pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_HOMING_TIMEOUT: i32 = 3;
pub const EXIT_HOMING_FAULT: i32 = 4;
pub const EXIT_LINK: i32 = 5;
pub const EXIT_MOVE_TIMEOUT: i32 = 6;

fn describe_axis_error(ae: &AxisError) -> String {
    match ae {
        AxisError::LinkTimeout => {
            "What happened: The motor controller did not answer in time.\nLikely causes: Module powered off, cable unplugged, or wrong module address.\nHow to fix: Check power and the connection, and verify [controller] module_id in the config.".to_string()
        }
        AxisError::Link(msg) => format!(
            "What happened: The motor controller reported an error ({msg}).\nLikely causes: Invalid axis index, a rejected register write, or a transport fault.\nHow to fix: Check the stage's axis in the config and re-run with --log-level=debug."
        ),
        AxisError::HomingTimeout {
            elapsed_ms,
            timeout_ms,
        } => format!(
            "What happened: Homing did not find the home switch within {timeout_ms} ms (gave up after {elapsed_ms} ms). The axis was stopped.\nLikely causes: Home switch not wired, wrong search mode, or search speed too low.\nHow to fix: Check the switch and [stages.<name>.homing], or raise timeout_ms / pass --timeout-ms."
        ),
        AxisError::HomingFaulted { error, cancel_error } => {
            let cancel = if cancel_error.is_some() {
                " Cancelling the search also failed; the axis may still be moving."
            } else {
                ""
            };
            format!(
                "What happened: Homing was aborted by a controller error ({error}).{cancel}\nLikely causes: Communication loss during the search.\nHow to fix: Check the link, stop the axis if it is still moving, then home again."
            )
        }
        AxisError::Configuration(msg) => format!(
            "What happened: Invalid stage configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
        ),
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => {
                "What happened: No controller link was provided to the axis.\nLikely causes: The backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the link is created and passed via with_link(...).".to_string()
            }
            BuildError::MissingStage => {
                "What happened: No stage configuration was provided to the axis.\nLikely causes: The builder was not given a stage.\nHow to fix: Pass the stage via with_stage(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(mt) = err.downcast_ref::<MoveTimedOut>() {
        return format!(
            "What happened: The move did not complete within {} ms; the axis was stopped at {}.\nLikely causes: Target too far for the configured velocity, or a stalled axis.\nHow to fix: Raise --timeout-ms or --velocity, and check the mechanics.",
            mt.timeout_ms, mt.position
        );
    }

    if let Some(ae) = err.downcast_ref::<AxisError>() {
        return describe_axis_error(ae);
    }

    // String-based heuristics for errors coming from config loading.
    // `{:#}` includes the wrapped cause chain.
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("unknown stage") {
        return format!(
            "What happened: {msg}.\nLikely causes: Typo in --stage or a missing [stages.<name>] table.\nHow to fix: Use one of the configured stage names."
        );
    }

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file ({msg}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with a readable TOML file."
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: A TOML syntax error, a missing key such as kind or axis, or an out-of-range value.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for scripting; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<MoveTimedOut>().is_some() {
        return EXIT_MOVE_TIMEOUT;
    }
    match err.downcast_ref::<AxisError>() {
        Some(AxisError::HomingTimeout { .. }) => EXIT_HOMING_TIMEOUT,
        Some(AxisError::HomingFaulted { .. }) => EXIT_HOMING_FAULT,
        Some(ae) if ae.is_link() => EXIT_LINK,
        _ => EXIT_GENERIC,
    }
}

/// Stable reason name used in JSON errors.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<MoveTimedOut>().is_some() {
        return "MoveTimeout";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<AxisError>() {
        Some(AxisError::HomingTimeout { .. }) => "HomingTimeout",
        Some(AxisError::HomingFaulted { .. }) => "HomingFaulted",
        Some(AxisError::LinkTimeout) => "LinkTimeout",
        Some(AxisError::Link(_)) => "Link",
        Some(AxisError::Configuration(_)) => "Configuration",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let message = humanize(err);
    let details = match err.downcast_ref::<AxisError>() {
        Some(AxisError::HomingTimeout {
            elapsed_ms,
            timeout_ms,
        }) => Some(json!({ "elapsed_ms": elapsed_ms, "timeout_ms": timeout_ms })),
        Some(AxisError::HomingFaulted { error, cancel_error }) => Some(json!({
            "error": error.to_string(),
            "cancel_error": cancel_error.as_ref().map(ToString::to_string),
        })),
        _ => err
            .downcast_ref::<MoveTimedOut>()
            .map(|mt| json!({ "timeout_ms": mt.timeout_ms, "position": mt.position })),
    };

    let obj = if let Some(d) = details {
        json!({ "reason": reason_name(err), "details": d, "message": message })
    } else {
        json!({ "reason": reason_name(err), "message": message })
    };
    obj.to_string()
}
