//! Tracing subscriber setup shared by meshwd binaries

use crate::{Error, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the default filter directive for a log level
///
/// Dependencies (reqwest, hyper) stay at `warn` so `debug` runs are readable.
pub fn default_directive(level: &str) -> String {
    format!(
        "warn,meshwd_reconcile={0},meshwd_common={0}",
        level.trim()
    )
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides `level` when set. When `log_file` is given, events are
/// also appended to that file without ANSI colouring.
pub fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", level, e)))?;

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Tracing already initialized: {}", e)))
}
