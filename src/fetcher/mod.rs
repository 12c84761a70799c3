pub mod http_fetcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::Result;

pub use http_fetcher::HttpFetcher;

/// One typed content block of a raw entry.
#[derive(Debug, Clone)]
pub struct ContentBlock {
    pub content_type: Option<String>,
    pub value: String,
}

/// A raw feed entry as delivered by the document, before extraction.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Canonical identifier (guid / atom id), preferred over the link
    /// for dedup when it is a valid absolute URL.
    pub uri: Option<String>,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Full-content extension block (content:encoded).
    pub full_content: Option<String>,
    pub content_blocks: Vec<ContentBlock>,
    pub summary: Option<String>,
    /// Alternate description from a metadata module.
    pub media_description: Option<String>,
}

/// A fetched and parsed feed document.
#[derive(Debug, Clone, Default)]
pub struct FetchedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub language: Option<String>,
    pub image_url: Option<String>,
    pub categories: Vec<String>,
    pub entries: Vec<RawEntry>,
}

/// The feed-fetch collaborator. Transport and document parsing both live
/// behind this seam; any failure surfaces as one error the pipeline
/// records on the feed.
#[async_trait]
pub trait FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed>;
}
