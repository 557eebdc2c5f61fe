//! Page-by-page message retrieval for a single channel.

use serde::Serialize;
use serde_json::Value;

use crate::archive::client::ArchiveApi;
use crate::archive::models::MessagePage;
use crate::config::ExportConfig;
use crate::{CoreError, Result};

/// How a channel is paginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    /// Messages requested per page.
    pub page_size: u32,
    /// Upper bound on requests per channel.
    pub max_pages: u32,
    /// Stop after the first page without messages.
    pub stop_on_empty: bool,
}

impl Default for PagePlan {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 10,
            stop_on_empty: true,
        }
    }
}

impl PagePlan {
    /// Build a plan from the export configuration.
    #[must_use]
    pub const fn from_config(cfg: &ExportConfig) -> Self {
        Self {
            page_size: cfg.page_size,
            max_pages: cfg.max_pages,
            stop_on_empty: cfg.stop_on_empty_page,
        }
    }

    /// Reject plans that would never request anything.
    ///
    /// # Errors
    ///
    /// Returns a config error when the page size or page count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(CoreError::Config("page size must be at least 1".to_string()));
        }
        if self.max_pages == 0 {
            return Err(CoreError::Config("max pages must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Offsets requested when no page comes back empty.
    pub fn offsets(&self) -> impl Iterator<Item = u32> + use<> {
        let size = self.page_size;
        (0..self.max_pages).map(move |page| page.saturating_mul(size))
    }
}

/// Lazy sequence of message pages for one channel.
///
/// Each call to [`MessagePages::next_page`] issues at most one request.
#[derive(Debug)]
pub struct MessagePages<'a, A> {
    api: &'a A,
    domain: &'a str,
    team_id: &'a str,
    channel_id: &'a str,
    plan: PagePlan,
    fetched: u32,
    exhausted: bool,
}

impl<'a, A: ArchiveApi> MessagePages<'a, A> {
    /// Start paginating `channel_id` from the newest message.
    ///
    /// # Errors
    ///
    /// Returns a config error if the plan is invalid.
    pub fn new(
        api: &'a A,
        domain: &'a str,
        team_id: &'a str,
        channel_id: &'a str,
        plan: PagePlan,
    ) -> Result<Self> {
        plan.validate()?;
        Ok(Self {
            api,
            domain,
            team_id,
            channel_id,
            plan,
            fetched: 0,
            exhausted: false,
        })
    }

    /// Fetch the next page, or `None` once the sequence is finished.
    ///
    /// # Errors
    ///
    /// Propagates the API error of the failing request. The sequence can be
    /// resumed with another call, which retries the same offset.
    pub async fn next_page(&mut self) -> Result<Option<MessagePage>> {
        if self.exhausted || self.fetched >= self.plan.max_pages {
            return Ok(None);
        }

        let offset = self.fetched.saturating_mul(self.plan.page_size);
        let page = self
            .api
            .fetch_messages(
                self.domain,
                self.team_id,
                self.channel_id,
                self.plan.page_size,
                offset,
            )
            .await?;
        self.fetched += 1;

        if self.plan.stop_on_empty && page.is_empty() {
            log::debug!(
                "{}: empty page at offset {offset}, stopping",
                self.channel_id
            );
            self.exhausted = true;
        }

        Ok(Some(page))
    }

    /// Rewind to the first page.
    pub const fn restart(&mut self) {
        self.fetched = 0;
        self.exhausted = false;
    }

    /// Number of pages fetched so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> u32 {
        self.fetched
    }
}

/// Everything gathered for one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelHistory {
    /// Messages of all pages, concatenated in fetch order (newest first).
    pub messages: Vec<Value>,
    /// Users referenced by any page, first occurrence wins.
    pub users: Vec<Value>,
    /// Requests issued.
    pub pages: u32,
}

impl ChannelHistory {
    /// Append one page.
    pub fn absorb(&mut self, page: &MessagePage) {
        self.messages.extend_from_slice(page.messages());
        for user in page.related_users() {
            if !self.users.iter().any(|known| same_user(known, user)) {
                self.users.push(user.clone());
            }
        }
        self.pages += 1;
    }
}

fn same_user(a: &Value, b: &Value) -> bool {
    match (a.get("id"), b.get("id")) {
        (Some(left), Some(right)) => left == right,
        _ => a == b,
    }
}

/// Drain all pages of a channel into a [`ChannelHistory`].
///
/// # Errors
///
/// Returns the first API error; pages gathered before it are discarded.
pub async fn collect_history<A: ArchiveApi>(
    api: &A,
    domain: &str,
    team_id: &str,
    channel_id: &str,
    plan: PagePlan,
) -> Result<ChannelHistory> {
    let mut pages = MessagePages::new(api, domain, team_id, channel_id, plan)?;
    let mut history = ChannelHistory::default();
    while let Some(page) = pages.next_page().await? {
        history.absorb(&page);
    }
    Ok(history)
}
