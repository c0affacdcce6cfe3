use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

use crate::env::logging as env_vars;

/// Logging configuration for chatvault
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: Level,
    /// Whether to log to the console (stderr, so stdout stays machine-readable)
    pub console: bool,
    /// Optional file path for logging
    pub file_path: Option<PathBuf>,
    /// Whether to use JSON format
    pub json_format: bool,
    /// Whether to use ANSI colors
    pub use_colors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            console: true,
            file_path: None,
            json_format: false,
            use_colors: true,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.use_colors = enabled;
        self
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level_str) = env::var(env_vars::LOG_LEVEL) {
            config.level = parse_level(&level_str);
        }

        if let Ok(file_path) = env::var(env_vars::LOG_FILE) {
            config.file_path = Some(PathBuf::from(file_path));
        }

        if env::var(env_vars::NO_COLOR).is_ok() {
            config.use_colors = false;
        }

        config
    }
}

fn parse_level(value: &str) -> Level {
    match value.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let filter = LevelFilter::from_level(config.level);

    if config.console {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.use_colors)
            .with_level(true)
            .with_target(true);
        if config.json_format {
            layers.push(layer.json().with_filter(filter).boxed());
        } else {
            layers.push(layer.with_filter(filter).boxed());
        }
    }

    if let Some(path) = &config.file_path {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = path
            .file_name()
            .context("Log file path has no file name")?;
        let appender = tracing_appender::rolling::never(directory, file_name);
        let layer = fmt::layer().with_writer(appender).with_ansi(false);
        if config.json_format {
            layers.push(layer.json().with_filter(filter).boxed());
        } else {
            layers.push(layer.with_filter(filter).boxed());
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(
        level = ?config.level,
        console = config.console,
        file_path = ?config.file_path,
        json_format = config.json_format,
        "Logging initialized"
    );

    Ok(())
}

/// Initialize logging from environment variables
pub fn init_from_env() -> Result<()> {
    init_logging(LoggingConfig::from_env())
}
