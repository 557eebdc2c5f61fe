//! Pass-through data models for archive responses.
//!
//! The archive returns loosely specified JSON. These wrappers keep every field
//! of the original object so exported artifacts mirror the API exactly, and
//! only expose the handful of keys the exporter relies on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CoreError, Result};

/// Team metadata as returned by the team lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Team(pub Value);

impl Team {
    /// Unique team identifier used by every subsequent call.
    ///
    /// # Errors
    ///
    /// Returns an API error if the object carries no string `team_id`.
    pub fn team_id(&self) -> Result<&str> {
        self.0["team_id"]
            .as_str()
            .ok_or_else(|| CoreError::Api("team object has no team_id".to_string()))
    }

    /// Borrow the raw JSON object.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

/// One entry of the channel list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(pub Value);

impl Channel {
    /// Channel name; empty when missing.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0["name"].as_str().unwrap_or_default()
    }

    /// Channels without a name are not exported.
    #[must_use]
    pub fn is_exportable(&self) -> bool {
        !self.name().is_empty()
    }

    /// Unique channel identifier.
    ///
    /// # Errors
    ///
    /// Returns an API error if the object carries no string `channel_id`.
    pub fn channel_id(&self) -> Result<&str> {
        self.0["channel_id"].as_str().ok_or_else(|| {
            CoreError::Api(format!("channel '{}' has no channel_id", self.name()))
        })
    }
}

/// Full body of one message page response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessagePage(pub Value);

impl MessagePage {
    /// Messages of this page, newest first. Empty when the key is absent.
    #[must_use]
    pub fn messages(&self) -> &[Value] {
        self.0["messages"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Users referenced by the messages of this page (`related.users`).
    #[must_use]
    pub fn related_users(&self) -> &[Value] {
        self.0["related"]["users"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the page carries no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}
