//! Tracing subscriber setup.

use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level applied to the crate's own targets (default: INFO).
    pub level: Level,
    /// Emit JSON lines instead of the human-readable format.
    pub json_format: bool,
    /// Directory for daily-rolling log files. Stdout only when `None`.
    pub log_dir: Option<String>,
    /// Colorize console output.
    pub colorize: bool,
    /// File name prefix for rolled log files.
    pub log_file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "nai-gateway".to_string(),
        }
    }
}

/// Keeps the file appender worker alive. Hold it for the life of the process.
#[allow(dead_code)]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn default_filter(level: Level) -> String {
    format!(
        "nai_gateway={},tower_http=warn",
        level.as_str().to_ascii_lowercase()
    )
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level` when set. Calling this
/// twice is harmless; the second subscriber is silently discarded.
pub fn init_logging(config: LoggingConfig) -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.level)));

    let mut layers = Vec::new();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_target(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));
    let stdout_layer = if config.json_format {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    };
    layers.push(stdout_layer);

    let mut file_guard = None;
    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory {}: {}", log_dir.display(), e);
        } else {
            let appender =
                RollingFileAppender::new(Rotation::DAILY, log_dir, config.log_file_name.clone());
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
                .with_writer(non_blocking);
            let file_layer = if config.json_format {
                file_layer.json().flatten_event(true).boxed()
            } else {
                file_layer.boxed()
            };
            layers.push(file_layer);
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}

/// Masks a credential for logging, keeping only a short prefix.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
