use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`. When `log_dir` is given,
/// a daily-rolling `<node_id>.log` file receives the same events.
pub fn init_logging(log_level: &str, log_dir: Option<&Path>, node_id: &str) -> Result<()> {
    // Create console layer
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(env_filter(log_level));

    // Create file layer
    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, dir, format!("{}.log", node_id));
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .with_writer(file_appender)
                    .with_filter(env_filter(log_level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::logging(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_log_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = init_logging("info", Some(&file.path().join("logs")), "test-node").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_init_logging_only_once() {
        let dir = tempfile::tempdir().unwrap();
        init_logging("debug", Some(&dir.path().join("nested")), "test-node").unwrap();
        assert!(dir.path().join("nested").is_dir());
        tracing::info!("logging initialized");

        let err = init_logging("info", None, "test-node").unwrap_err();
        assert!(matches!(err, Error::Logging(_)));
    }
}
