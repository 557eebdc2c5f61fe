//! Configuration types and loading for the application.

use std::path::Path;

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::paths::{expand_str_path, write_default_config};
use crate::{AppPaths, env_prefix};

/// Default archive API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.slackarchive.io";

/// Default host of the public archive pages, used to build the referer.
pub const DEFAULT_SITE_HOST: &str = "slackarchive.io";

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for the application"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Runtime behavior configuration.
    pub runtime: RuntimeConfig,

    /// Archive API endpoints.
    pub api: ApiConfig,

    /// Export layout and pagination.
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths, dry_run: bool) -> Result<Self> {
        if !paths.config_file.exists() {
            if dry_run {
                log::info!(
                    "dry-run: would create default config at {}",
                    paths.config_file.display()
                );
            } else {
                write_default_config(&paths.config_file)?;
            }
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("runtime.timeout", 30_i64)?
            .set_default("runtime.retries", 2_i64)?
            .set_default("runtime.retry_backoff_ms", 500_i64)?
            .set_default("runtime.fail_fast", false)?
            .set_default("api.base_url", DEFAULT_BASE_URL)?
            .set_default("api.site_host", DEFAULT_SITE_HOST)?
            .set_default("export.channel_file", "channel.json")?
            .set_default("export.page_size", 100_i64)?
            .set_default("export.max_pages", 10_i64)?
            .set_default("export.stop_on_empty_page", true)?
            .set_default("export.write_users", true)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_str_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }
        if let Some(ref dir) = config.export.output_dir {
            let expanded = expand_str_path(dir)?;
            config.export.output_dir = Some(expanded.display().to_string());
        }

        Ok(config)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors.
    Warn,
    /// Emit informational messages and above (default).
    #[default]
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// Runtime behavior configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Runtime behavior configuration")]
pub struct RuntimeConfig {
    /// Per-request timeout in seconds (default: 30).
    #[schemars(range(min = 1))]
    pub timeout: u64,

    /// How many times a request is retried after a connection failure or timeout.
    pub retries: u32,

    /// Base delay between retries in milliseconds, multiplied by the attempt number.
    pub retry_backoff_ms: u64,

    /// Abort the whole export on the first failing channel.
    pub fail_fast: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            retries: 2,
            retry_backoff_ms: 500,
            fail_fast: false,
        }
    }
}

/// Archive API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Archive API endpoints")]
pub struct ApiConfig {
    /// Base URL of the archive API.
    pub base_url: String,

    /// Host of the public archive site; requests send `https://<domain>.<site_host>/` as referer.
    pub site_host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            site_host: DEFAULT_SITE_HOST.to_string(),
        }
    }
}

/// Export layout and pagination.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Export layout and pagination")]
pub struct ExportConfig {
    /// Directory receiving the JSON artifacts. Defaults to the working directory.
    /// Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// File name of the channel list artifact.
    pub channel_file: String,

    /// Messages requested per page.
    #[schemars(range(min = 1))]
    pub page_size: u32,

    /// Maximum number of pages fetched per channel.
    #[schemars(range(min = 1))]
    pub max_pages: u32,

    /// Stop paginating a channel once a page comes back empty.
    pub stop_on_empty_page: bool,

    /// Write `users/<channel>.json` from the related users of each page.
    pub write_users: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            channel_file: "channel.json".to_string(),
            page_size: 100,
            max_pages: 10,
            stop_on_empty_page: true,
            write_users: true,
        }
    }
}
