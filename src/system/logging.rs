//! Logging system initialization
//!
//! Sets up tracing based on the loaded configuration. Call once at
//! startup, after [`crate::config::init_config`]. The returned guard must
//! be kept alive for the lifetime of the process so buffered log lines
//! are flushed.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub fn init_logging(config: &LoggingConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let to_stdout = config.file.as_ref().is_none_or(|f| f.is_empty());

    let writer: Box<dyn std::io::Write + Send + Sync> = if to_stdout {
        Box::new(std::io::stdout())
    } else {
        let path = config.file.as_deref().unwrap_or_default();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("Failed to open log file");
        Box::new(file)
    };

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);
    let filter = EnvFilter::new(config.level.clone());

    let builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(to_stdout);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    guard
}
