use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One normalized entry belonging to a feed.
///
/// Dedup identity is `(feed_id, uri)` when the uri is a valid absolute
/// URL, else `(feed_id, link)`, else `(feed_id, title)` — never the
/// store-assigned `id`. `updated_at = None` means the entry was never
/// revised by its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: Option<i64>,
    pub feed_id: i64,
    pub link: String,
    pub uri: Option<String>,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub is_liked: bool,
}

impl FeedItem {
    pub fn new(feed_id: i64) -> Self {
        Self {
            id: None,
            feed_id,
            link: String::new(),
            uri: None,
            title: String::new(),
            content: String::new(),
            author: None,
            published_at: None,
            created_at: Utc::now(),
            updated_at: None,
            is_read: false,
            is_liked: false,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(untitled)"
        } else {
            &self.title
        }
    }

    /// Hex SHA-256 of the content body, the audit's content key.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let mut a = FeedItem::new(1);
        a.content = "same body".into();
        let mut b = FeedItem::new(2);
        b.content = "same body".into();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_content_hash_differs() {
        let mut a = FeedItem::new(1);
        a.content = "body one".into();
        let mut b = FeedItem::new(1);
        b.content = "body two".into();
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let item = FeedItem::new(1);
        let hash = item.content_hash();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_display_title() {
        let mut item = FeedItem::new(1);
        assert_eq!(item.display_title(), "(untitled)");
        item.title = "A Post".into();
        assert_eq!(item.display_title(), "A Post");
    }
}
