use crate::{config::LoggingConfig, paths::AppDirs, APP_NAME};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the background log writer alive; drop it last.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Log to a daily file in the app's log dir, keeping at most
/// `max_log_files` of them. With `stdout = true` records are echoed to
/// stderr, leaving stdout to the installer's own messages.
pub fn init_logging(config: &LoggingConfig, dirs: &AppDirs) -> Result<LoggingGuard, LoggingError> {
    let log_dir = dirs.log_dir();
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDirectory {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let directive = config.level.as_filter_directive();
    let env_filter = EnvFilter::try_new(directive).map_err(|source| LoggingError::ParseLevel {
        level: directive.to_string(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_file_name(config))
        .max_log_files(config.max_log_files.max(1))
        .build(log_dir)
        .map_err(|source| LoggingError::Appender {
            path: log_dir.to_path_buf(),
            source,
        })?;
    let (file, file_guard) = tracing_appender::non_blocking(appender);

    let writer = if config.stdout {
        BoxMakeWriter::new(std::io::stderr.and(file))
    } else {
        BoxMakeWriter::new(file)
    };

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(LoggingError::SubscriberInstall)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn log_file_name(config: &LoggingConfig) -> String {
    config
        .file_name
        .clone()
        .unwrap_or_else(|| format!("{APP_NAME}.log"))
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse log level {level}: {source}")]
    ParseLevel {
        level: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to open log file in {path}: {source}")]
    Appender { path: PathBuf, source: InitError },
    #[error("failed to install tracing subscriber: {0}")]
    SubscriberInstall(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn filter_directive_is_lowercase() {
        assert_eq!(LogLevel::Warn.as_filter_directive(), "warn");
    }

    #[test]
    fn log_file_defaults_to_app_name() {
        let mut config = LoggingConfig::default();
        assert_eq!(log_file_name(&config), "xcinstall.log");

        config.file_name = Some("install.log".into());
        assert_eq!(log_file_name(&config), "install.log");
    }
}
