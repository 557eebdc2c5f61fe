//! Core library for slackarchive - export SlackArchive teams to JSON.
//!
//! This crate provides:
//! - Configuration loading and management
//! - Config file and export directory resolution
//! - Schema and example config generation
//! - The SlackArchive API client and channel pagination
//! - Sorted, pretty-printed JSON artifacts and the export run itself
//! - Common types and error handling

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod exporter;
pub mod paths;
pub mod schema;

pub use archive::{ArchiveApi, ArchiveClient, Channel, MessagePage, PagePlan, Team};
pub use config::{ApiConfig, AppConfig, ExportConfig, LogLevel, LoggingConfig, RuntimeConfig};
pub use error::{CoreError, Result};
pub use export::{ExportLayout, write_json};
pub use exporter::{ChannelReport, ExportOptions, ExportSummary, Exporter};
pub use paths::{AppPaths, default_config_dir};
pub use schema::{generate_example_config, generate_schema, write_generated_files};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "slackarchive";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
