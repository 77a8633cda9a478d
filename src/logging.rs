//! Logging setup
//!
//! stderr output plus an optional daily-rotated log file, both behind one
//! `EnvFilter` so `RUST_LOG` directives keep working.

use crate::error::{Result, TrixelError};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

pub const ENV_LOG_FILE: &str = "TRIXEL_LOG_FILE";
pub const ENV_LOG_STDERR: &str = "TRIXEL_LOG_STDERR";

const DEFAULT_LOG_FILE_NAME: &str = "trixel-contributor.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` has no directive for a target
    pub level: Level,

    /// Log to a daily-rotated file
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    pub thread_ids: bool,

    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_path: None,
            stderr: true,
            thread_ids: false,
            json: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(rust_log) = lookup("RUST_LOG") {
            let rust_log = rust_log.to_lowercase();
            config.level = [
                ("trace", Level::TRACE),
                ("debug", Level::DEBUG),
                ("info", Level::INFO),
                ("warn", Level::WARN),
                ("error", Level::ERROR),
            ]
            .into_iter()
            .find(|(name, _)| rust_log.contains(name))
            .map(|(_, level)| level)
            .unwrap_or(config.level);
        }

        if let Some(log_file) = lookup(ENV_LOG_FILE) {
            config.file_path = Some(PathBuf::from(log_file));
        }

        if let Some(log_stderr) = lookup(ENV_LOG_STDERR) {
            config.stderr = log_stderr.to_lowercase() != "false";
        }

        config
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

/// Install the global subscriber
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.stderr {
        layers.push(output_layer(&config, std::io::stderr, true));
    }

    if let Some(file_path) = &config.file_path {
        let (directory, file_name) = split_log_path(file_path);
        std::fs::create_dir_all(&directory)?;
        let appender = tracing_appender::rolling::daily(directory, file_name);
        layers.push(output_layer(&config, appender, false));
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TrixelError::config(format!("Failed to install logger: {e}")))
}

fn output_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(config.thread_ids);

    if config.json {
        layer.json().boxed()
    } else {
        layer.with_ansi(ansi).boxed()
    }
}

fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_NAME));
    (directory, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("RUST_LOG", "trixel_contribution_client=debug"),
            (ENV_LOG_FILE, "/var/log/trixel/agent.log"),
            (ENV_LOG_STDERR, "FALSE"),
        ]
        .into_iter()
        .collect();

        let config = LogConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.file_path, Some(PathBuf::from("/var/log/trixel/agent.log")));
        assert!(!config.stderr);
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(LogConfig::from_lookup(|_| None), LogConfig::default());
    }

    #[test]
    fn test_split_log_path() {
        assert_eq!(
            split_log_path(Path::new("agent.log")),
            (PathBuf::from("."), PathBuf::from("agent.log"))
        );
        assert_eq!(
            split_log_path(Path::new("/var/log/agent.log")),
            (PathBuf::from("/var/log"), PathBuf::from("agent.log"))
        );
    }
}
