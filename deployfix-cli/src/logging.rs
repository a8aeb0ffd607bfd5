//! Log sink configuration: console output unless `--quiet`, a fixed-location
//! log file unless `--no-log-file`.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Written into the current working directory.
pub const LOG_FILE: &str = "deployfix.log";

pub fn init(quiet: bool, no_log_file: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let console = (!quiet).then(|| fmt::layer().with_target(false).without_time());

    let file = if no_log_file {
        None
    } else {
        let file =
            std::fs::File::create(LOG_FILE).with_context(|| format!("create {LOG_FILE}"))?;
        Some(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(console)
        .with(file)
        .init();
    Ok(())
}
