//! Converts raw feed entries into candidate items for reconciliation.
//!
//! The body of an entry can arrive in several places depending on the
//! feed dialect; [`extract_content`] picks exactly one, by a strict
//! fallback chain, so that re-fetching an unchanged feed always yields
//! the same body.

use chrono::Utc;
use html_escape::decode_html_entities;

use crate::domain::FeedItem;
use crate::fetcher::RawEntry;

/// MIME type preference order for typed content blocks. Types not in
/// this list sort after every listed one.
pub const CONTENT_TYPES: [&str; 6] = [
    "text/html",
    "html",
    "text/plain",
    "text",
    "text/xhtml",
    "xhtml",
];

fn type_rank(content_type: Option<&str>) -> usize {
    content_type
        .and_then(|t| {
            let t = t.to_lowercase();
            CONTENT_TYPES.iter().position(|c| *c == t)
        })
        .unwrap_or(usize::MAX)
}

/// Picks the single best textual body for an entry.
///
/// Priority: the full-content extension block, then the typed content
/// block with the most preferred MIME type, then the summary, then the
/// alternate metadata description, then the empty string. First
/// non-empty value at each tier wins; sources are never merged.
pub fn extract_content(entry: &RawEntry) -> String {
    if let Some(full) = &entry.full_content {
        if !full.is_empty() {
            return full.clone();
        }
    }

    let best_block = entry
        .content_blocks
        .iter()
        .filter(|b| !b.value.is_empty())
        .min_by_key(|b| type_rank(b.content_type.as_deref()));
    if let Some(block) = best_block {
        return block.value.clone();
    }

    if let Some(summary) = &entry.summary {
        if !summary.is_empty() {
            return summary.clone();
        }
    }

    if let Some(description) = &entry.media_description {
        if !description.is_empty() {
            return description.clone();
        }
    }

    String::new()
}

#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Builds the staging candidate for one raw entry. `created_at` is
    /// provisional; it only sticks if the reconciler inserts the item.
    pub fn candidate(&self, feed_id: i64, entry: &RawEntry) -> FeedItem {
        FeedItem {
            id: None,
            feed_id,
            link: entry.link.clone().unwrap_or_default(),
            uri: entry
                .uri
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from),
            title: entry
                .title
                .as_deref()
                .map(|t| decode_html_entities(t).to_string())
                .unwrap_or_default(),
            content: decode_html_entities(&extract_content(entry)).to_string(),
            author: entry.author.clone().filter(|a| !a.is_empty()),
            published_at: entry.published,
            created_at: Utc::now(),
            updated_at: entry.updated,
            is_read: false,
            is_liked: false,
        }
    }

    pub fn candidates(&self, feed_id: i64, entries: &[RawEntry]) -> Vec<FeedItem> {
        entries
            .iter()
            .map(|entry| self.candidate(feed_id, entry))
            .collect()
    }
}
