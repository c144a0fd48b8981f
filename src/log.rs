use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::prelude::*;

use crate::config;

/// Variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "COMPILER_LSP_LOG";

/// Installs the JSON file logger. The returned guard flushes pending records
/// when dropped and must outlive the server.
pub fn init() -> anyhow::Result<WorkerGuard> {
    let data_dir = config::data_dir();

    std::fs::create_dir_all(&data_dir).inspect_err(|e| {
        eprintln!("Failed to create data directory: {}", e);
    })?;

    let log_path = config::log_path();
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid log path {:?}", log_path))?;
    let appender = tracing_appender::rolling::never(&data_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .fmt_fields(JsonFields::default());

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .try_init()?;

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
