//! JSON artifacts on disk.
//!
//! Every artifact is written with sorted object keys and four-space
//! indentation so repeated exports of the same data are byte-identical.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::{CoreError, Result};

/// Subdirectory holding one message artifact per channel.
pub const MESSAGES_DIR: &str = "messages";

/// Subdirectory holding one related-users artifact per channel.
pub const USERS_DIR: &str = "users";

/// File name of the team artifact.
pub const TEAM_FILE: &str = "team.json";

/// Render `data` as pretty JSON with sorted keys.
///
/// # Errors
///
/// Returns a serialization error if `data` cannot be represented as JSON.
pub fn render_json<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(data)
        .map_err(|e| CoreError::Serialization(format!("converting to JSON: {e}")))?;
    let value = sort_keys(value);

    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .map_err(|e| CoreError::Serialization(format!("rendering JSON: {e}")))?;
    Ok(buffer)
}

/// Write `data` to `path`, replacing any existing file.
///
/// The document is rendered completely before the file is opened.
///
/// # Errors
///
/// Returns a serialization error, or an export error naming `path` when the
/// file cannot be written.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let body = render_json(data)?;
    fs::write(path, body).map_err(|source| CoreError::Export {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

// Rebuilding maps in key order keeps output sorted even when serde_json is
// compiled with `preserve_order`.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Where the artifacts of one export go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    root: PathBuf,
    channel_file: String,
}

impl ExportLayout {
    /// Layout rooted at `root`, naming the channel list `channel_file`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, channel_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            channel_file: channel_file.into(),
        }
    }

    /// Export root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root and the per-channel subdirectories if missing.
    ///
    /// # Errors
    ///
    /// Returns an export error naming the directory that could not be created.
    pub fn prepare(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.root.join(MESSAGES_DIR),
            self.root.join(USERS_DIR),
        ] {
            fs::create_dir_all(&dir).map_err(|source| CoreError::Export { path: dir, source })?;
        }
        Ok(())
    }

    /// Path of the team artifact.
    #[must_use]
    pub fn team_path(&self) -> PathBuf {
        self.root.join(TEAM_FILE)
    }

    /// Path of the channel list artifact.
    #[must_use]
    pub fn channel_list_path(&self) -> PathBuf {
        self.root.join(&self.channel_file)
    }

    /// Path of the message artifact with file stem `stem`.
    #[must_use]
    pub fn messages_file(&self, stem: &str) -> PathBuf {
        self.root.join(MESSAGES_DIR).join(format!("{stem}.json"))
    }

    /// Path of the related-users artifact with file stem `stem`.
    #[must_use]
    pub fn users_file(&self, stem: &str) -> PathBuf {
        self.root.join(USERS_DIR).join(format!("{stem}.json"))
    }
}

/// Map a channel name to a file stem that stays inside its directory.
///
/// Every character outside ASCII alphanumerics, `.`, `_` and `-` becomes `_`,
/// so distinct names may share a stem.
///
/// # Errors
///
/// Returns a path error for empty names and names made only of dots.
pub fn channel_file_stem(channel_name: &str) -> Result<String> {
    if channel_name.is_empty() || channel_name.chars().all(|c| c == '.') {
        return Err(CoreError::Path(format!(
            "channel name '{channel_name}' is not a usable file name"
        )));
    }
    Ok(channel_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect())
}
