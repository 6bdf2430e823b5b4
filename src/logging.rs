//! Logging initialization for lanekeeper.
//!
//! Logs go to stderr so stdout carries only the JSON result. With
//! `logging.to_file` they go to `<state>/logs/lanekeeper-{datetime}.log`,
//! inside the shared state directory rather than the working tree.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Flushes buffered file output when dropped; keep it alive until exit.
    pub _guard: Option<WorkerGuard>,

    pub log_file_path: Option<PathBuf>,
}

/// Level directive: `--debug` wins over the configured level
fn level_directive(config: &Config, debug_override: bool) -> String {
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

fn log_file_name() -> String {
    format!("lanekeeper-{}.log", chrono::Utc::now().format("%Y%m%dT%H%M%SZ"))
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// `logs_dir` is only used when `logging.to_file` is set; without it logs
/// stay on stderr.
pub fn init_logging(
    config: &Config,
    logs_dir: Option<&Path>,
    debug_override: bool,
) -> Result<LoggingHandle> {
    let level = level_directive(config, debug_override);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let (true, Some(logs_dir)) = (config.logging.to_file, logs_dir) {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

        let log_filename = log_file_name();
        let log_file_path = logs_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // init_logging installs a global subscriber, so only the pure parts are tested here.

    #[test]
    fn test_debug_flag_overrides_level() {
        let mut config = Config::default();
        config.logging.level = "warn".to_string();

        assert_eq!(level_directive(&config, false), "warn");
        assert_eq!(level_directive(&config, true), "debug");
    }

    #[test]
    fn test_log_file_name_format() {
        let name = log_file_name();
        assert!(name.starts_with("lanekeeper-"));
        assert!(name.ends_with("Z.log"));
    }

    #[test]
    fn test_configured_level_parses_as_filter() {
        let config = Config::default();
        assert!(EnvFilter::try_new(level_directive(&config, false)).is_ok());
    }
}
