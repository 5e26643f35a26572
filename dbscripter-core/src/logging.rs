//! Shared logging setup for the dbscripter binary.

use crate::Result;

/// Maps the CLI verbosity flags to a maximum log level.
///
/// `quiet` wins over any verbosity count.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `json` - Emit one JSON object per event instead of human-readable lines
///
/// # Example
/// ```rust,no_run
/// use dbscripter_core::logging::init_logging;
///
/// init_logging(1, false, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level_for(verbose, quiet))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let initialized = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    initialized.map_err(|e| {
        crate::error::ScripterError::configuration(format!(
            "Failed to initialize logging: {}",
            e
        ))
    })
}
