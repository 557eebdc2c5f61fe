//! SlackArchive API access.
//!
//! This module provides:
//! - Pass-through models for teams, channels and message pages
//! - The HTTP client for the archive endpoints
//! - Pagination of a channel's message history

pub mod client;
pub mod models;
pub mod pager;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{ArchiveApi, ArchiveClient, validate_domain};
pub use models::{Channel, MessagePage, Team};
pub use pager::{ChannelHistory, MessagePages, PagePlan, collect_history};
