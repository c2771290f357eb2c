#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! `stage`: command-line control of the configured stepper stages.
//!
//! Every invocation loads and validates the TOML config, assembles the
//! controller backend, runs one subcommand and prints its result as text or a
//! JSON line. Errors are rendered by `error_fmt` and mapped to stable exit
//! codes.

mod cli;
mod commands;
mod error_fmt;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(&cli) {
        tracing::error!(error = ?err, "command failed");
        if cli.json {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: &Cli) -> eyre::Result<()> {
    color_eyre::install()?;

    let cfg = load_config(&cli.config)?;
    init_logging(cli, &cfg.logging)?;
    tracing::info!(
        config = %cli.config.display(),
        stages = cfg.stages.len(),
        command = cli.cmd.name(),
        "starting"
    );

    let link = commands::simulated_backend(&cfg);
    let outcome = commands::run(&cli.cmd, &cfg, &link)?;

    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", outcome.to_json(cli.cmd.name()));
    } else {
        println!("{outcome}");
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<stage_config::Config> {
    let cfg = stage_config::load_file(path)?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

/// Console layer on stderr (pretty or JSON) plus an optional JSON file layer.
/// `RUST_LOG` wins over `--log-level`, which wins over `[logging] level`.
fn init_logging(cli: &Cli, logging: &stage_config::Logging) -> eyre::Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .or(logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);

    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if cli.json {
        layers.push(console.json().boxed());
    } else {
        layers.push(console.boxed());
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .wrap_err("installing the log subscriber")?;
    Ok(())
}
