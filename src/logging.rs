//! Subscriber set-up: console output filtered by `-v`, plus the nightly
//! log file when a log directory is configured.

use chrono::Utc;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Filter for a `-v` count. With no `-v`, `RUST_LOG` wins when set.
pub fn filter_for(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,reqwest=debug",
    };
    if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    }
}

/// `rcred_<YYYY-MM-DD>.log`, dated by UTC start time.
pub fn log_file_name() -> String {
    format!("rcred_{}.log", Utc::now().format("%Y-%m-%d"))
}

/// Install the global subscriber. Keep the returned guard alive for as
/// long as the file log should be flushed.
pub fn init(verbose: u8, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, log_file_name());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_for(verbose))
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Logger initialization failed: {e}")))?;
    Ok(guard)
}
