//! Tracing subscriber setup.
//!
//! `PENMAN_LOG` takes an `EnvFilter` directive (default `warn`). Logs go to
//! stderr unless `PENMAN_LOG_FILE` names a file, in which case they are
//! appended there through a non-blocking writer.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_ENV: &str = "PENMAN_LOG";
const LOG_FILE_ENV: &str = "PENMAN_LOG_FILE";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered file logs are flushed.
pub fn init() -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    if let Some(path) = std::env::var_os(LOG_FILE_ENV).map(PathBuf::from) {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        let file_name = path.file_name().map_or_else(
            || "penman.log".into(),
            std::ffi::OsStr::to_os_string,
        );
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init();
        return Some(guard);
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
    None
}
