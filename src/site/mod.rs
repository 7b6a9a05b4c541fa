//! Site adapters.
//!
//! Each supported forum implements [`ForumSite`]; the pipeline orchestration
//! (scoring, caching, AI, retry) is shared and site-agnostic.

pub mod discourse;

use async_trait::async_trait;

use crate::browser::PageDriver;
use crate::error::Result;
use crate::model::{Topic, TopicContent};

/// Which topic list to harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListKind {
    Latest,
    Hot,
    Category(String),
}

impl ListKind {
    /// Site-relative path for this list.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Latest => "/latest".to_string(),
            Self::Hot => "/top".to_string(),
            Self::Category(name) => format!("/c/{}", slugify(name)),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Hot => "hot".to_string(),
            Self::Category(name) => format!("category:{name}"),
        }
    }
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Everything the shared pipeline needs from one site.
#[async_trait]
pub trait ForumSite: Send + Sync {
    fn site_name(&self) -> &str;

    fn username(&self) -> &str;

    fn base_url(&self) -> &str;

    /// Standalone authentication probe. Ambiguity resolves to "authenticated"
    /// so a restored session is not thrown away needlessly.
    async fn is_logged_in(&self, page: &dyn PageDriver) -> Result<bool>;

    /// Full authentication flow.
    async fn login(&self, page: &dyn PageDriver) -> Result<()>;

    /// Fetch one topic list in DOM order, up to `limit` rows.
    async fn fetch_list(
        &self,
        page: &dyn PageDriver,
        kind: &ListKind,
        limit: usize,
    ) -> Result<Vec<Topic>>;

    /// Fetch one topic's first-post excerpt. Empty content is a valid result.
    async fn fetch_detail(&self, page: &dyn PageDriver, link: &str) -> Result<TopicContent>;
}
