//! Configuration management for the prediction service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `LIFEBOAT__SERVER__PORT=9000`
const ENV_PREFIX: &str = "LIFEBOAT";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
}

/// Gate artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the ONNX gate files.
    /// Defaults to `models/` next to the executable.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,
    /// Number of threads for ONNX inference per gate (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries, 0 disables the reporter
    pub report_interval_secs: u64,
}

impl ModelsConfig {
    /// Resolve the directory gates are loaded from
    pub fn resolve_dir(&self) -> PathBuf {
        match &self.models_dir {
            Some(dir) => dir.clone(),
            None => default_models_dir(),
        }
    }
}

/// `models/` beside the running executable, or in the working directory when
/// the executable path is unknown
fn default_models_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("models")
}

impl AppConfig {
    /// Load configuration from a specific path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = AppConfig::default();

        let config = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("models.onnx_threads", defaults.models.onnx_threads as i64)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", "pretty")?
            .set_default(
                "metrics.report_interval_secs",
                defaults.metrics.report_interval_secs as i64,
            )?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            models: ModelsConfig {
                models_dir: None,
                onnx_threads: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
        }
    }
}
