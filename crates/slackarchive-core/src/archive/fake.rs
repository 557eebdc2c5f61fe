//! In-memory archive used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::archive::client::ArchiveApi;
use crate::archive::models::{Channel, MessagePage, Team};
use crate::{CoreError, Result};

/// One recorded `fetch_messages` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCall {
    pub domain: String,
    pub team_id: String,
    pub channel_id: String,
    pub size: u32,
    pub offset: u32,
}

/// Archive serving synthetic channels of a given length.
#[derive(Debug, Default)]
pub struct FakeArchive {
    pub team: Option<Value>,
    pub channels: Vec<Value>,
    pub message_counts: HashMap<String, u64>,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<MessageCall>>,
}

impl FakeArchive {
    /// Team `T1` with a `general` channel and one unnamed channel.
    pub fn acme() -> Self {
        Self {
            team: Some(json!({"team_id": "T1", "name": "Acme"})),
            channels: vec![
                json!({"channel_id": "C1", "name": "general"}),
                json!({"channel_id": "C2", "name": ""}),
            ],
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel_id: &str, name: &str) -> Self {
        self.channels
            .push(json!({"channel_id": channel_id, "name": name}));
        self
    }

    pub fn with_channel_messages(mut self, channel_id: &str, count: u64) -> Self {
        self.message_counts.insert(channel_id.to_string(), count);
        self
    }

    pub fn failing_channel(mut self, channel_id: &str) -> Self {
        self.failing.insert(channel_id.to_string());
        self
    }

    pub fn message_calls(&self) -> Vec<MessageCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl ArchiveApi for FakeArchive {
    async fn fetch_team(&self, domain: &str) -> Result<Team> {
        self.team
            .clone()
            .map(Team)
            .ok_or_else(|| CoreError::NotFound(format!("no team for domain '{domain}'")))
    }

    async fn fetch_channels(&self, _domain: &str, _team_id: &str) -> Result<Vec<Channel>> {
        Ok(self.channels.iter().cloned().map(Channel).collect())
    }

    async fn fetch_messages(
        &self,
        domain: &str,
        team_id: &str,
        channel_id: &str,
        size: u32,
        offset: u32,
    ) -> Result<MessagePage> {
        self.calls.lock().expect("calls lock").push(MessageCall {
            domain: domain.to_string(),
            team_id: team_id.to_string(),
            channel_id: channel_id.to_string(),
            size,
            offset,
        });

        if self.failing.contains(channel_id) {
            return Err(CoreError::Network(format!("{channel_id}: connection reset")));
        }

        let total = self.message_counts.get(channel_id).copied().unwrap_or(0);
        let start = u64::from(offset).min(total);
        let end = (u64::from(offset) + u64::from(size)).min(total);
        let messages: Vec<Value> = (start..end)
            .map(|seq| json!({"seq": seq, "channel": channel_id, "text": format!("message {seq}")}))
            .collect();
        let users = if messages.is_empty() {
            Vec::new()
        } else {
            vec![
                json!({"id": "U0", "name": "admin"}),
                json!({"id": format!("U-{channel_id}-{offset}")}),
            ]
        };

        Ok(MessagePage(json!({
            "messages": messages,
            "related": {"users": users},
        })))
    }
}
