//! SlackArchive API client.
//!
//! The archive exposes three read-only JSON endpoints:
//!
//! 1. `GET /v1/team?domain=` resolves a team domain to its metadata
//! 2. `GET /v1/channels?team_id=` lists the channels of a team
//! 3. `GET /v1/messages?size=&team=&channel=&offset=` returns one page of
//!    messages, newest first, together with the users they reference
//!
//! Every request carries `referer: https://<domain>.<site_host>/`; the API
//! rejects requests without it.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::REFERER;
use serde_json::Value;

use crate::archive::models::{Channel, MessagePage, Team};
use crate::config::{ApiConfig, RuntimeConfig};
use crate::{CoreError, Result};

const TEAM_ENDPOINT: &str = "/v1/team";
const CHANNELS_ENDPOINT: &str = "/v1/channels";
const MESSAGES_ENDPOINT: &str = "/v1/messages";

/// Read access to the archive.
///
/// Implemented by [`ArchiveClient`] over HTTP; the pager and the exporter only
/// depend on this trait.
pub trait ArchiveApi {
    /// Resolve a team domain to the team metadata.
    fn fetch_team(&self, domain: &str) -> impl Future<Output = Result<Team>> + Send;

    /// List the channels of a team, in API order.
    fn fetch_channels(
        &self,
        domain: &str,
        team_id: &str,
    ) -> impl Future<Output = Result<Vec<Channel>>> + Send;

    /// Fetch `size` messages of a channel, skipping the `offset` newest ones.
    fn fetch_messages(
        &self,
        domain: &str,
        team_id: &str,
        channel_id: &str,
        size: u32,
        offset: u32,
    ) -> impl Future<Output = Result<MessagePage>> + Send;
}

/// HTTP client for the archive API.
///
/// Built once per run; the underlying connection pool is shared by all calls.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    http_client: Client,
    base_url: String,
    site_host: String,
    retries: u32,
    retry_backoff: Duration,
}

impl ArchiveClient {
    /// Create a new archive client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(api: &ApiConfig, runtime: &RuntimeConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(runtime.timeout.max(1)))
            .user_agent(concat!("slackarchive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::Other(format!("creating HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            site_host: api.site_host.clone(),
            retries: runtime.retries,
            retry_backoff: Duration::from_millis(runtime.retry_backoff_ms),
        })
    }

    /// Referer expected by the archive for requests about `domain`.
    #[must_use]
    pub fn referer(&self, domain: &str) -> String {
        format!("https://{domain}.{}/", self.site_host)
    }

    /// GET an endpoint, retrying connection failures and timeouts.
    async fn get_json(
        &self,
        domain: &str,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Value> {
        validate_domain(domain)?;
        let mut attempt = 0;
        loop {
            match self.get_json_once(domain, endpoint, query).await {
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * attempt;
                    log::warn!(
                        "{endpoint} for '{domain}' failed: {e}; retry {attempt}/{} in {delay:?}",
                        self.retries
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn get_json_once(
        &self,
        domain: &str,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let url = format!("{}{endpoint}", self.base_url);
        log::debug!("GET {url} {query:?}");

        let response = self
            .http_client
            .get(&url)
            .header(REFERER, self.referer(domain))
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::Api(format!(
                "{endpoint} for '{domain}' failed: {status} - {text}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, &e))?;

        let data: Value = serde_json::from_slice(&body).map_err(|e| {
            CoreError::Api(format!("{endpoint} for '{domain}' returned invalid JSON: {e}"))
        })?;

        if !data.is_object() {
            return Err(CoreError::Api(format!(
                "{endpoint} for '{domain}' returned a non-object body"
            )));
        }

        Ok(data)
    }
}

impl ArchiveApi for ArchiveClient {
    async fn fetch_team(&self, domain: &str) -> Result<Team> {
        let mut data = self
            .get_json(domain, TEAM_ENDPOINT, &[("domain", domain.to_string())])
            .await?;

        let teams = data
            .get_mut("team")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| {
                CoreError::Api(format!("team lookup for '{domain}': missing team array"))
            })?;

        if teams.is_empty() {
            return Err(CoreError::NotFound(format!("no team for domain '{domain}'")));
        }

        Ok(Team(teams.swap_remove(0)))
    }

    async fn fetch_channels(&self, domain: &str, team_id: &str) -> Result<Vec<Channel>> {
        let mut data = self
            .get_json(domain, CHANNELS_ENDPOINT, &[("team_id", team_id.to_string())])
            .await?;

        match data.get_mut("channels").map(Value::take) {
            Some(Value::Array(channels)) => Ok(channels.into_iter().map(Channel).collect()),
            _ => Err(CoreError::Api(format!(
                "channel list for team {team_id}: missing channels array"
            ))),
        }
    }

    async fn fetch_messages(
        &self,
        domain: &str,
        team_id: &str,
        channel_id: &str,
        size: u32,
        offset: u32,
    ) -> Result<MessagePage> {
        let query = [
            ("size", size.to_string()),
            ("team", team_id.to_string()),
            ("channel", channel_id.to_string()),
            ("offset", offset.to_string()),
        ];
        let page = MessagePage(self.get_json(domain, MESSAGES_ENDPOINT, &query).await?);
        log::trace!("{channel_id}@{offset}: {} messages", page.messages().len());
        Ok(page)
    }
}

/// Check that a team domain can be used as a host label.
///
/// # Errors
///
/// Returns a config error for empty domains or characters outside
/// ASCII alphanumerics, `-` and `_`.
pub fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(CoreError::Config("team domain is empty".to_string()));
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::Config(format!(
            "invalid team domain '{domain}': use the subdomain only, e.g. 'kubernetes'"
        )));
    }
    Ok(())
}

fn transport_error(endpoint: &str, e: &reqwest::Error) -> CoreError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        CoreError::Network(format!("{endpoint}: {e}"))
    } else {
        CoreError::Api(format!("{endpoint}: {e}"))
    }
}
