//! Process logging: readable console output plus a daily-rolling JSON
//! file that carries the structured error fields operators grep for.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder as RollingBuilder, RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_RETENTION: usize = 7;

/// Installs the global subscriber and returns the file writer's flush
/// guard. Dropping the guard loses buffered records, so the caller keeps
/// it alive for the whole process. Returns None when no log directory is
/// writable; console logging still works in that case.
pub fn init(service: &str) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(env_filter.clone());

    let Some(file_appender) = json_file_appender(service) else {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    };

    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    Some(guard)
}

/// Rolls one file per day under ACHV_LOG_DIR (default ./logs), named
/// after the service so multiple workers can share a directory.
fn json_file_appender(service: &str) -> Option<RollingFileAppender> {
    let log_dir = std::env::var("ACHV_LOG_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logs"));
    std::fs::create_dir_all(&log_dir).ok()?;

    RollingBuilder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(service)
        .filename_suffix("json")
        .max_log_files(LOG_FILE_RETENTION)
        .build(&log_dir)
        .ok()
}
