use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;

use crate::app::{FreshetError, Result};
use crate::fetcher::{ContentBlock, FeedFetcher, FetchedFeed, RawEntry};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .gzip(true)
            .brotli(true)
            .user_agent("freshet/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        let body = response.bytes().await?;

        let feed =
            parser::parse(body.as_ref()).map_err(|e| FreshetError::FeedParse(e.to_string()))?;

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| {
                let uri = if entry.id.is_empty() {
                    None
                } else {
                    Some(entry.id)
                };
                RawEntry {
                    title: entry.title.map(|t| t.content),
                    link: entry.links.first().map(|l| l.href.clone()),
                    uri,
                    author: entry.authors.first().map(|a| a.name.clone()),
                    published: entry.published,
                    updated: entry.updated,
                    // feed-rs folds content:encoded into the entry content,
                    // so it arrives here as a typed block.
                    full_content: None,
                    content_blocks: entry
                        .content
                        .into_iter()
                        .filter_map(|c| {
                            let content_type = Some(c.content_type.to_string());
                            c.body.map(|value| ContentBlock {
                                content_type,
                                value,
                            })
                        })
                        .collect(),
                    summary: entry.summary.map(|s| s.content),
                    media_description: entry
                        .media
                        .iter()
                        .find_map(|m| m.description.as_ref().map(|d| d.content.clone())),
                }
            })
            .collect();

        Ok(FetchedFeed {
            title: feed.title.map(|t| t.content),
            description: feed.description.map(|d| d.content),
            author: feed.authors.first().map(|a| a.name.clone()),
            copyright: feed.rights.map(|r| r.content),
            language: feed.language,
            image_url: feed
                .logo
                .map(|i| i.uri)
                .or_else(|| feed.icon.map(|i| i.uri)),
            categories: feed
                .categories
                .into_iter()
                .map(|c| c.label.unwrap_or(c.term))
                .collect(),
            entries,
        })
    }
}
