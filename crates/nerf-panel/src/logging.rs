use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{Error, Result};

/// Filter directive read from the environment before the configured level.
pub const LOG_ENV: &str = "NERF_PANEL_LOG";

/// Keeps the logging setup alive; owned by `main` for the life of the process.
#[derive(Debug)]
pub struct LogHandle {
    file: Option<PathBuf>,
}

impl LogHandle {
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

pub fn log_file_name() -> String {
    format!(
        "nerf-panel-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    )
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console output plus JSON lines in `<dir>/nerf-panel-<timestamp>.log`. An empty `dir`
/// disables the file.
pub fn init(level: &str, dir: &Path) -> Result<LogHandle> {
    let (json_layer, file) = if dir.as_os_str().is_empty() {
        (None, None)
    } else {
        fs::create_dir_all(dir).map_err(|e| {
            Error::config(format!("failed to create log dir {}: {e}", dir.display()))
        })?;
        let path = dir.join(log_file_name());
        let sink = File::create(&path)
            .map_err(|e| Error::config(format!("failed to create {}: {e}", path.display())))?;
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(Arc::new(sink));
        (Some(layer), Some(path))
    };

    tracing_subscriber::registry()
        .with(filter(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(json_layer)
        .try_init()
        .map_err(|e| Error::msg(format!("logging already initialised: {e}")))?;

    if let Some(path) = &file {
        tracing::info!(file = %path.display(), "writing logs");
    }
    Ok(LogHandle { file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_names_carry_a_timestamp() {
        let name = log_file_name();
        assert!(name.starts_with("nerf-panel-"));
        assert!(name.ends_with(".log"));
        // nerf-panel-YYYYmmdd-HHMMSS.log
        assert_eq!(name.len(), "nerf-panel-".len() + 15 + ".log".len());
    }
}
