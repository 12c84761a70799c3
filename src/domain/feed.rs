use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::FeedItem;
use crate::util::url::trim_url;

/// A subscribed syndication source and its metadata.
///
/// `last_ok_fetch`/`last_failed_fetch` are `None` until the first
/// success/failure; the refresh policy branches on absence instead of
/// sentinel dates. `staged` holds freshly fetched candidate items that
/// have not been reconciled against the store yet and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: Option<i64>,
    pub url: String,
    pub name: Option<String>,
    pub uri: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub language: Option<String>,
    pub image_url: Option<String>,
    /// Semicolon-joined tag list.
    pub categories: Option<String>,
    pub last_ok_fetch: Option<DateTime<Utc>>,
    pub last_failed_fetch: Option<DateTime<Utc>>,
    pub last_fail_msg: Option<String>,
    pub last_fail_response_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub staged: Vec<FeedItem>,
}

impl Feed {
    /// The url is the natural key and is stored trailing-slash trimmed.
    pub fn new(url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            url: trim_url(url),
            name: None,
            uri: None,
            description: None,
            author: None,
            copyright: None,
            language: None,
            image_url: None,
            categories: None,
            last_ok_fetch: None,
            last_failed_fetch: None,
            last_fail_msg: None,
            last_fail_response_code: None,
            created_at: now,
            updated_at: now,
            staged: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.url,
        }
    }

    pub fn mark_failed(&mut self, message: String) {
        self.last_failed_fetch = Some(Utc::now());
        self.last_fail_msg = Some(message);
    }
}
