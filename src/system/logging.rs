//! Logging system initialization
//!
//! 根据 `[logging]` 配置初始化 tracing：控制台或文件输出，
//! 可选按天轮转，可选 JSON 格式。`RUST_LOG` 优先于配置中的级别。

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::{RelayError, Result};

const DEFAULT_LOG_NAME: &str = "smsrelay.log";

fn build_writer(config: &LoggingConfig) -> Result<Box<dyn std::io::Write + Send + Sync>> {
    let Some(log_file) = config.file.as_deref().filter(|f| !f.is_empty()) else {
        return Ok(Box::new(std::io::stdout()));
    };

    if config.enable_rotation {
        let path = Path::new(log_file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(DEFAULT_LOG_NAME);

        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(filename.trim_end_matches(".log"))
            .filename_suffix("log")
            .max_log_files(config.max_backups.max(1) as usize)
            .build(dir)
            .map_err(|e| {
                RelayError::file_operation(format!(
                    "Failed to create rolling log appender in {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        Ok(Box::new(appender))
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| {
                RelayError::file_operation(format!("Failed to open log file {}: {}", log_file, e))
            })?;
        Ok(Box::new(file))
    }
}

/// Initialize logging system based on configuration
///
/// 返回的 `WorkerGuard` 必须在程序运行期间保持存活，否则缓冲中的日志会丢失。
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let writer = build_writer(config)?;
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| RelayError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(config.file.as_ref().is_none_or(|f| f.is_empty()));

    let result = if config.format == "json" {
        subscriber_builder.json().try_init()
    } else {
        subscriber_builder.try_init()
    };
    result.map_err(|e| RelayError::config(format!("Failed to install log subscriber: {}", e)))?;

    Ok(guard)
}
