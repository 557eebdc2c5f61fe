//! Full export of one team: team metadata, channel list, and per-channel
//! message and user artifacts.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::archive::{ArchiveApi, Channel, PagePlan, collect_history, validate_domain};
use crate::config::AppConfig;
use crate::export::{ExportLayout, channel_file_stem, write_json};
use crate::{CoreError, Result};

/// Switches that shape an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Also write `users/<channel>.json`.
    pub write_users: bool,
    /// Abort on the first failing channel instead of moving on.
    pub fail_fast: bool,
    /// Fetch everything but write nothing.
    pub dry_run: bool,
    /// Only export these channel names; all channels when empty.
    pub channels: Vec<String>,
}

impl ExportOptions {
    /// Options as configured, before command-line overrides.
    #[must_use]
    pub const fn from_config(cfg: &AppConfig) -> Self {
        Self {
            write_users: cfg.export.write_users,
            fail_fast: cfg.runtime.fail_fast,
            dry_run: false,
            channels: Vec::new(),
        }
    }

    fn selects(&self, channel_name: &str) -> bool {
        self.channels.is_empty() || self.channels.iter().any(|c| c == channel_name)
    }
}

/// Outcome for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    /// Channel name.
    pub name: String,
    /// Channel identifier, empty if the API omitted it.
    pub channel_id: String,
    /// Messages written.
    pub messages: usize,
    /// Related users written.
    pub users: usize,
    /// Page requests issued.
    pub pages: u32,
    /// Failure description when the channel could not be exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelReport {
    fn failed(channel: &Channel, error: &CoreError) -> Self {
        Self {
            name: channel.name().to_string(),
            channel_id: channel.channel_id().unwrap_or_default().to_string(),
            messages: 0,
            users: 0,
            pages: 0,
            error: Some(error.to_string()),
        }
    }

    /// Whether the channel was exported.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a whole export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Team domain that was exported.
    pub domain: String,
    /// Resolved team identifier.
    pub team_id: String,
    /// Directory holding the artifacts.
    pub output_dir: PathBuf,
    /// Channels listed by the archive.
    pub channels_total: usize,
    /// Channels not exported because they have no name or were filtered out.
    pub skipped: usize,
    /// Per-channel outcomes in archive order.
    pub reports: Vec<ChannelReport>,
    /// Whether artifacts were actually written.
    pub dry_run: bool,
    /// Start of the run.
    pub started_at: DateTime<Utc>,
    /// End of the run.
    pub finished_at: DateTime<Utc>,
}

impl ExportSummary {
    /// Channels that could not be exported.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_ok()).count()
    }

    /// Messages written across all channels.
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.reports.iter().map(|r| r.messages).sum()
    }
}

/// Drives client, pager and writer for one team.
#[derive(Debug)]
pub struct Exporter<'a, A> {
    api: &'a A,
    layout: ExportLayout,
    plan: PagePlan,
    options: ExportOptions,
}

impl<'a, A: ArchiveApi> Exporter<'a, A> {
    /// Create an exporter writing into `layout`.
    #[must_use]
    pub const fn new(api: &'a A, layout: ExportLayout, plan: PagePlan, options: ExportOptions) -> Self {
        Self {
            api,
            layout,
            plan,
            options,
        }
    }

    /// Export the team behind `domain`.
    ///
    /// `on_channel` is called after every attempted channel, in archive order.
    ///
    /// # Errors
    ///
    /// Fails when the team or channel list cannot be fetched or written, and
    /// on the first channel failure when `fail_fast` is set. Otherwise channel
    /// failures are only recorded in the summary.
    pub async fn run<F>(&self, domain: &str, mut on_channel: F) -> Result<ExportSummary>
    where
        F: FnMut(&ChannelReport),
    {
        let started_at = Utc::now();
        validate_domain(domain)?;
        self.plan.validate()?;

        if self.options.dry_run {
            log::info!("dry-run: would prepare {}", self.layout.root().display());
        } else {
            self.layout.prepare()?;
        }

        let team = self.api.fetch_team(domain).await?;
        let team_id = team.team_id()?.to_string();
        log::info!("team '{domain}' is {team_id}");
        self.write(&self.layout.team_path(), &team)?;

        let channels = self.api.fetch_channels(domain, &team_id).await?;
        log::info!("{} channels listed for {team_id}", channels.len());
        self.write(&self.layout.channel_list_path(), &channels)?;

        let mut reports = Vec::new();
        let mut skipped = 0;
        let mut stems = FileStems::default();
        for channel in &channels {
            if !channel.is_exportable() {
                log::debug!("skipping unnamed channel {}", channel.0["channel_id"]);
                skipped += 1;
                continue;
            }
            if !self.options.selects(channel.name()) {
                log::debug!("channel '{}' not selected", channel.name());
                skipped += 1;
                continue;
            }

            let outcome = match stems.claim(channel) {
                Ok(stem) => self.export_channel(domain, &team_id, channel, &stem).await,
                Err(e) => Err(e),
            };
            let report = match outcome {
                Ok(report) => report,
                Err(e) if self.options.fail_fast => {
                    return Err(CoreError::Channel {
                        channel: channel.name().to_string(),
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    log::warn!("channel '{}' failed: {e}", channel.name());
                    ChannelReport::failed(channel, &e)
                }
            };
            on_channel(&report);
            reports.push(report);
        }

        Ok(ExportSummary {
            domain: domain.to_string(),
            team_id,
            output_dir: self.layout.root().to_path_buf(),
            channels_total: channels.len(),
            skipped,
            reports,
            dry_run: self.options.dry_run,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn export_channel(
        &self,
        domain: &str,
        team_id: &str,
        channel: &Channel,
        stem: &str,
    ) -> Result<ChannelReport> {
        let name = channel.name();
        let channel_id = channel.channel_id()?;
        let messages_path = self.layout.messages_file(stem);
        let users_path = self.layout.users_file(stem);

        let history = collect_history(self.api, domain, team_id, channel_id, self.plan).await?;

        self.write(&messages_path, &history.messages)?;
        if self.options.write_users {
            self.write(&users_path, &history.users)?;
        }
        log::info!(
            "{name}: {} messages, {} users in {} pages",
            history.messages.len(),
            history.users.len(),
            history.pages
        );

        Ok(ChannelReport {
            name: name.to_string(),
            channel_id: channel_id.to_string(),
            messages: history.messages.len(),
            users: if self.options.write_users {
                history.users.len()
            } else {
                0
            },
            pages: history.pages,
            error: None,
        })
    }

    fn write<T: Serialize + ?Sized>(&self, path: &Path, data: &T) -> Result<()> {
        if self.options.dry_run {
            log::info!("dry-run: would write {}", path.display());
            return Ok(());
        }
        write_json(path, data)
    }
}

/// File stems handed out during one run, keyed case-insensitively so
/// case-folding filesystems cannot merge two channels either.
#[derive(Debug, Default)]
struct FileStems {
    owners: HashMap<String, String>,
}

impl FileStems {
    /// Reserve a stem for `channel`.
    ///
    /// A channel whose sanitized name is already taken gets `<stem>-<channel_id>`.
    fn claim(&mut self, channel: &Channel) -> Result<String> {
        let name = channel.name();
        let stem = channel_file_stem(name)?;
        let Some(owner) = self.try_claim(&stem, name) else {
            return Ok(stem);
        };

        let channel_id = channel.channel_id()?;
        let unique = channel_file_stem(&format!("{stem}-{channel_id}"))?;
        match self.try_claim(&unique, name) {
            None => {
                log::warn!(
                    "channels '{owner}' and '{name}' both map to '{stem}.json'; writing '{name}' as '{unique}.json'"
                );
                Ok(unique)
            }
            Some(other) => Err(CoreError::Path(format!(
                "channel '{name}' ({channel_id}) collides with '{owner}' and '{other}' on file name '{unique}.json'"
            ))),
        }
    }

    /// Record `stem` for `name`, or return the channel already holding it.
    fn try_claim(&mut self, stem: &str, name: &str) -> Option<String> {
        match self.owners.entry(stem.to_lowercase()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(name.to_string());
                None
            }
        }
    }
}
