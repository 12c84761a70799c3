use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{FreshetError, Result};
use crate::domain::{Feed, FeedItem};
use crate::store::Store;
use crate::util::url::trim_url;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| FreshetError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FreshetError::Other(format!("Connection lock poisoned: {}", e)))
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: Some(row.get(0)?),
            url: row.get(1)?,
            name: row.get(2)?,
            uri: row.get(3)?,
            description: row.get(4)?,
            author: row.get(5)?,
            copyright: row.get(6)?,
            language: row.get(7)?,
            image_url: row.get(8)?,
            categories: row.get(9)?,
            last_ok_fetch: row
                .get::<_, Option<String>>(10)?
                .and_then(|s| Self::parse_datetime(&s)),
            last_failed_fetch: row
                .get::<_, Option<String>>(11)?
                .and_then(|s| Self::parse_datetime(&s)),
            last_fail_msg: row.get(12)?,
            last_fail_response_code: row.get(13)?,
            created_at: row
                .get::<_, String>(14)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            updated_at: row
                .get::<_, String>(15)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            staged: Vec::new(),
        })
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<FeedItem> {
        Ok(FeedItem {
            id: Some(row.get(0)?),
            feed_id: row.get(1)?,
            link: row.get(2)?,
            uri: row.get(3)?,
            title: row.get(4)?,
            content: row.get(5)?,
            author: row.get(6)?,
            published_at: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| Self::parse_datetime(&s)),
            created_at: row
                .get::<_, String>(8)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            updated_at: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| Self::parse_datetime(&s)),
            is_read: row.get::<_, i32>(10)? != 0,
            is_liked: row.get::<_, i32>(11)? != 0,
        })
    }
}

const FEED_COLUMNS: &str = "id, url, name, uri, description, author, copyright, language, \
     image_url, categories, last_ok_fetch, last_failed_fetch, last_fail_msg, \
     last_fail_response_code, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, feed_id, link, uri, title, content, author, published_at, \
     created_at, updated_at, is_read, is_liked";

impl Store for SqliteStore {
    fn insert_feed(&self, feed: &Feed) -> Result<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO feeds (url, name, uri, description, author, copyright, language, \
             image_url, categories, last_ok_fetch, last_failed_fetch, last_fail_msg, \
             last_fail_response_code, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                trim_url(&feed.url),
                feed.name,
                feed.uri,
                feed.description,
                feed.author,
                feed.copyright,
                feed.language,
                feed.image_url,
                feed.categories,
                feed.last_ok_fetch.map(|dt| dt.to_rfc3339()),
                feed.last_failed_fetch.map(|dt| dt.to_rfc3339()),
                feed.last_fail_msg,
                feed.last_fail_response_code,
                now,
                now,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM feeds WHERE id = ?1", FEED_COLUMNS),
                params![id],
                Self::feed_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feeds WHERE url = ?1 COLLATE NOCASE ORDER BY id",
            FEED_COLUMNS
        ))?;

        let feeds = stmt
            .query_map(params![trim_url(url)], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if feeds.len() > 1 {
            tracing::error!(
                "There should not be {} feeds for url '{}'",
                feeds.len(),
                url
            );
        }
        Ok(feeds.into_iter().next())
    }

    fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feeds ORDER BY name, url",
            FEED_COLUMNS
        ))?;
        let feeds = stmt
            .query_map([], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn update_feed(&self, id: i64, feed: &Feed) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE feeds SET url = ?1, name = ?2, uri = ?3, description = ?4, author = ?5, \
             copyright = ?6, language = ?7, image_url = ?8, categories = ?9, \
             last_ok_fetch = ?10, last_failed_fetch = ?11, last_fail_msg = ?12, \
             last_fail_response_code = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                trim_url(&feed.url),
                feed.name,
                feed.uri,
                feed.description,
                feed.author,
                feed.copyright,
                feed.language,
                feed.image_url,
                feed.categories,
                feed.last_ok_fetch.map(|dt| dt.to_rfc3339()),
                feed.last_failed_fetch.map(|dt| dt.to_rfc3339()),
                feed.last_fail_msg,
                feed.last_fail_response_code,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;
        Ok(())
    }

    fn delete_feed(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn feed_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM feeds", [], |row| row.get(0))?;
        Ok(count)
    }

    fn insert_item(&self, item: &FeedItem) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO items (feed_id, link, uri, title, content, author, published_at, \
             created_at, updated_at, is_read, is_liked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                item.feed_id,
                item.link,
                item.uri,
                item.title,
                item.content,
                item.author,
                item.published_at.map(|dt| dt.to_rfc3339()),
                item.created_at.to_rfc3339(),
                item.updated_at.map(|dt| dt.to_rfc3339()),
                item.is_read as i32,
                item.is_liked as i32,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_item(&self, id: i64, item: &FeedItem) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE items SET link = ?1, uri = ?2, title = ?3, content = ?4, author = ?5, \
             published_at = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                item.link,
                item.uri,
                item.title,
                item.content,
                item.author,
                item.published_at.map(|dt| dt.to_rfc3339()),
                item.updated_at.map(|dt| dt.to_rfc3339()),
                id,
            ],
        )?;
        Ok(())
    }

    fn get_items_by_feed(&self, feed_id: i64) -> Result<Vec<FeedItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE feed_id = ?1 ORDER BY published_at DESC, created_at DESC",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![feed_id], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn item_count_for_feed(&self, feed_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE feed_id = ?1",
            params![feed_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn item_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count)
    }

    fn delete_item(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        Ok(())
    }
}
