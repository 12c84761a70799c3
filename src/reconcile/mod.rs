//! Per-item reconciliation: match a candidate against the feed's stored
//! items and decide insert, update or skip.
//!
//! The match key is never the store id. A candidate is identified by its
//! uri when that is a valid absolute URL, else by its link, else by its
//! title. Link and uri comparisons ignore the protocol so an entry that
//! moves from http to https does not duplicate.

use crate::app::Result;
use crate::domain::FeedItem;
use crate::store::Store;
use crate::util::time::is_first_after_second;
use crate::util::url::{is_valid_url, strip_protocol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciled {
    pub item_id: i64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct ItemReconciler;

impl ItemReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Reconciles one candidate. On insert the candidate adopts the
    /// store-assigned id; on match it adopts the existing item's id, and
    /// the existing record is rewritten only when the candidate carries a
    /// strictly newer `updated_at`. Re-ingesting an unchanged feed is a
    /// storage no-op.
    pub fn reconcile<S: Store>(
        &self,
        store: &S,
        feed_id: i64,
        candidate: &mut FeedItem,
    ) -> Result<Option<Reconciled>> {
        let Some(key) = self.match_key(candidate) else {
            tracing::error!("No search terms for candidate item of feed {}", feed_id);
            return Ok(None);
        };
        let existing = self.find_existing(store, feed_id, &key, candidate)?;

        match existing {
            None => {
                let id = store.insert_item(candidate)?;
                candidate.id = Some(id);
                Ok(Some(Reconciled {
                    item_id: id,
                    outcome: Outcome::Inserted,
                }))
            }
            Some(existing) => {
                let id = existing.id.unwrap_or_default();
                candidate.id = Some(id);
                if is_first_after_second(candidate.updated_at, existing.updated_at) {
                    store.update_item(id, candidate)?;
                    Ok(Some(Reconciled {
                        item_id: id,
                        outcome: Outcome::Updated,
                    }))
                } else {
                    Ok(Some(Reconciled {
                        item_id: id,
                        outcome: Outcome::Unchanged,
                    }))
                }
            }
        }
    }

    fn find_existing<S: Store>(
        &self,
        store: &S,
        feed_id: i64,
        key: &MatchKey,
        candidate: &FeedItem,
    ) -> Result<Option<FeedItem>> {
        let stored = store.get_items_by_feed(feed_id)?;
        let matches: Vec<FeedItem> = stored
            .into_iter()
            .filter(|item| key.matches(item))
            .collect();

        if matches.len() > 1 {
            tracing::error!(
                "There should not be {} items for feed {} / '{}'",
                matches.len(),
                feed_id,
                candidate.link
            );
            for item in &matches {
                tracing::error!("{:?} | {} | {}", item.id, item.created_at, item.link);
            }
        }

        // Deterministic pick on anomaly: the latest-created match wins.
        Ok(matches.into_iter().max_by_key(|item| item.created_at))
    }

    fn match_key(&self, candidate: &FeedItem) -> Option<MatchKey> {
        if let Some(uri) = candidate.uri.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            if is_valid_url(uri) {
                return Some(MatchKey::UriPattern(
                    strip_protocol(uri).to_lowercase(),
                ));
            }
            return Some(MatchKey::UriExact(uri.to_string()));
        }
        let link = candidate.link.trim();
        if !link.is_empty() {
            return Some(MatchKey::LinkPattern(strip_protocol(link).to_string()));
        }
        let title = candidate.title.trim();
        if !title.is_empty() {
            return Some(MatchKey::Title(title.to_string()));
        }
        None
    }
}

enum MatchKey {
    /// Protocol-stripped, case-insensitive pattern match on uri.
    UriPattern(String),
    /// Exact match for uris that are not URLs (tag: ids and the like).
    UriExact(String),
    /// Protocol-stripped pattern match on link. Links stay case sensitive.
    LinkPattern(String),
    Title(String),
}

impl MatchKey {
    fn matches(&self, item: &FeedItem) -> bool {
        match self {
            MatchKey::UriPattern(pattern) => item
                .uri
                .as_deref()
                .is_some_and(|u| strip_protocol(u).to_lowercase().contains(pattern)),
            MatchKey::UriExact(uri) => item.uri.as_deref() == Some(uri.as_str()),
            MatchKey::LinkPattern(pattern) => {
                strip_protocol(&item.link).contains(pattern.as_str())
            }
            MatchKey::Title(title) => item.title == *title,
        }
    }
}
