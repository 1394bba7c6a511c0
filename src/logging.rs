use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

pub const LOG_ENV: &str = "STAFFROLL_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// Append to the configured log file. The terminal belongs to the UI.
    File,
    Stderr,
}

fn filter(cfg: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(cfg.level.trim()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Never-rotating appender writing to exactly `path`. Missing parent
/// directories are created.
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("logging: {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy().into_owned())
        .build(dir)
        .with_context(|| format!("logging: open {}", path.display()))
}

/// Installs the global subscriber. Without a log file the file sink
/// discards events.
///
/// The returned guard flushes the file writer on drop; keep it alive for as
/// long as events should reach the file.
pub fn init(cfg: &LogConfig, sink: Sink) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(filter(cfg));

    match (sink, cfg.file.as_deref()) {
        (Sink::Stderr, _) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .without_time()
                        .with_ansi(false),
                )
                .try_init()
                .context("logging: install stderr subscriber")?;
            Ok(None)
        }
        (Sink::File, Some(path)) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .try_init()
                .context("logging: install file subscriber")?;
            Ok(Some(guard))
        }
        (Sink::File, None) => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::sink))
                .try_init()
                .context("logging: install null subscriber")?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_log_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("staffroll.log");
        file_appender(&path).unwrap();
        assert!(path.is_file());
    }
}
