use std::env;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Target shared by the library and the binary in log filters.
const LOG_TARGET: &str = env!("CARGO_CRATE_NAME");
const LOG_FILE_NAME: &str = concat!(env!("CARGO_PKG_NAME"), ".log");

/// Stdout gets pretty output, the log file plain lines with targets and thread names
/// (`scan-walker`, `scan-worker-N`). Keep the guard alive for the whole run.
pub fn init_logger() -> WorkerGuard {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| format!("warn,{}=info", LOG_TARGET));
    let filter_layer = EnvFilter::new(filter);

    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| format!("./logs/{}", LOG_FILE_NAME));
    let log_file_path = Path::new(&log_file_path);
    let directory = log_file_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_file_path
        .file_name()
        .map(Path::new)
        .unwrap_or(Path::new(LOG_FILE_NAME));

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    info!(
        "Logging to stdout and {}",
        directory.join(file_name).display()
    );

    guard
}
