//! Tracing setup for hosts that want the engine's default logging.
//!
//! Libraries embedding the engine can skip this entirely and install their
//! own subscriber; everything in the crate logs through `tracing` macros.

use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::domain::settings::LogSettings;

/// Keeps the file-appender worker alive; dropping it flushes and stops
/// background log writing.
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// `RUST_LOG` wins over the configured level. The level must name a plain
/// level ("trace" through "error"); anything else falls back to `info`.
fn build_env_filter(level: &str) -> EnvFilter {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::INFO);
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()))
}

fn rotation_from_name(name: &str) -> Rotation {
    match name.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// Installs the global subscriber per the settings. Call once, early, and
/// keep the returned guard alive for the life of the process.
pub fn init_logging(settings: &LogSettings) -> LoggingGuard {
    let mut guards = Vec::new();

    let console_layer = settings.console_logging_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(settings.show_target)
            .with_ansi(settings.ansi_colors)
    });

    let file_layer = settings.file_logging_enabled.then(|| {
        let appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation_from_name(&settings.rotation),
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(settings.show_target)
    });

    tracing_subscriber::registry()
        .with(build_env_filter(&settings.level))
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("logging initialized");

    LoggingGuard { _guards: guards }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_names_map_case_insensitively() {
        assert_eq!(rotation_from_name("Hourly"), Rotation::HOURLY);
        assert_eq!(rotation_from_name("minutely"), Rotation::MINUTELY);
        assert_eq!(rotation_from_name("NEVER"), Rotation::NEVER);
        assert_eq!(rotation_from_name("daily"), Rotation::DAILY);
        assert_eq!(rotation_from_name("weekly"), Rotation::DAILY);
    }

    #[test]
    fn configured_level_is_validated() {
        std::env::remove_var("RUST_LOG");
        assert_eq!(build_env_filter("debug").to_string(), "debug");
        assert_eq!(build_env_filter("WARN").to_string(), "warn");
        // Target directives and garbage are not levels.
        assert_eq!(build_env_filter("not a real level!!").to_string(), "info");
        assert_eq!(build_env_filter("bandlink=trace").to_string(), "info");
    }
}
