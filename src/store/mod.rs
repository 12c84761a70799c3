pub mod sqlite;

use crate::app::Result;
use crate::domain::{Feed, FeedItem};

pub use sqlite::SqliteStore;

/// Typed operations over the document store. The reconciler and auditor
/// make their decisions in code; the store only reads and writes records.
pub trait Store {
    // Feed operations
    fn insert_feed(&self, feed: &Feed) -> Result<i64>;
    fn get_feed(&self, id: i64) -> Result<Option<Feed>>;
    /// Case-insensitive lookup over the trimmed url.
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn get_all_feeds(&self) -> Result<Vec<Feed>>;
    /// Full header write. Stamps a fresh `updated_at` on every call.
    fn update_feed(&self, id: i64, feed: &Feed) -> Result<()>;
    /// Removes the feed and, through the schema's cascade, its items.
    fn delete_feed(&self, id: i64) -> Result<()>;
    fn feed_count(&self) -> Result<i64>;

    // Item operations
    fn insert_item(&self, item: &FeedItem) -> Result<i64>;
    /// Writes link, uri, title, content, author, published and updated.
    /// Never touches created_at or the read/liked flags.
    fn update_item(&self, id: i64, item: &FeedItem) -> Result<()>;
    fn get_items_by_feed(&self, feed_id: i64) -> Result<Vec<FeedItem>>;
    fn item_count_for_feed(&self, feed_id: i64) -> Result<i64>;
    fn item_count(&self) -> Result<i64>;
    fn delete_item(&self, id: i64) -> Result<()>;
}
