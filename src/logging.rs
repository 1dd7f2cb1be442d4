//! Logging setup: file + stdout tracing layers driven by [`crate::config::AppConfig`].

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let logging = &config.logging;

    let file_appender = match logging.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&logging.log_dir, &logging.log_file),
        "daily" => tracing_appender::rolling::daily(&logging.log_dir, &logging.log_file),
        _ => tracing_appender::rolling::never(&logging.log_dir, &logging.log_file),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter_str = if logging.enable_tracing {
        logging.log_level.clone()
    } else {
        format!("{},spotventure=off", logging.log_level)
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let registry = tracing_subscriber::registry().with(filter);

    if logging.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}
