//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file
//! output. Console output goes to STDERR so that `decode` output on STDOUT
//! stays pipeable.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Errors
///
/// Returns error if the level is not a valid filter, the log file cannot be
/// opened, or a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use eventrelay::config::LoggingConfig;
/// use eventrelay::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     json_format: true,
///     file_path: None,
///     include_payload: false,
/// };
///
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_format {
        let console_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);

        if let Some(file_path) = &config.file_path {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(Arc::new(file));

            registry.with(console_layer).with(file_layer).try_init()?;
        } else {
            registry.with(console_layer).try_init()?;
        }
    } else {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_writer(std::io::stderr);

        if let Some(file_path) = &config.file_path {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));

            registry.with(console_layer).with(file_layer).try_init()?;
        } else {
            registry.with(console_layer).try_init()?;
        }
    }

    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    Ok(filter)
}
