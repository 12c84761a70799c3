//! Offline consistency scans over the feed and item collections.
//!
//! The schema does not enforce uniqueness of feed urls or item links, so
//! duplicates can accumulate from overlapping syncs or source churn. The
//! auditor reports them after the fact. It is read-only except for one
//! narrow legacy cleanup path, see [`AuditConfig::legacy_cleanup_hosts`].
//!
//! [`AuditConfig::legacy_cleanup_hosts`]: crate::config::AuditConfig

use std::collections::HashMap;

use crate::app::Result;
use crate::config::AuditConfig;
use crate::domain::FeedItem;
use crate::store::Store;
use crate::util::time::eq_ignoring_mins_secs;
use crate::util::url::{base_url, host_and_path, is_valid_url};

/// One anomaly found during a scan. Findings name item ids so an operator
/// can act on them; only `deleted_item` records an action already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Two feeds share a url, compared case-insensitively.
    DuplicateFeedUrl { url: String, feed_ids: (i64, i64) },
    /// Two items are equal in every field that matters; the older one by
    /// created date is safe to remove. Report only.
    RemovableItemDuplicate {
        feed_id: i64,
        keep_id: i64,
        remove_id: i64,
    },
    /// Two items share a link key but differ in some field.
    DuplicateItemLink {
        feed_id: i64,
        item_ids: (i64, i64),
        key: String,
    },
    /// Two items share title, publish date and content hash.
    DuplicateItemContent {
        feed_id: i64,
        item_ids: (i64, i64),
        /// Item deleted by the legacy cleanup path, if it applied.
        deleted_item: Option<i64>,
    },
    /// Two items share a raw uri.
    DuplicateItemUri {
        feed_id: i64,
        item_ids: (i64, i64),
        uri: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AuditSummary {
    pub feeds_scanned: usize,
    pub items_scanned: usize,
    pub findings: Vec<Finding>,
}

impl AuditSummary {
    pub fn ok(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Verdict of the link-collision detector for one colliding pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkVerdict {
    /// Title, link, uri and content all match.
    ExactDuplicate,
    /// Title, link and uri match, publish dates agree at hour
    /// granularity and the authors match.
    NearDuplicate,
    /// Same link key, but the rest differs.
    Distinct,
}

pub struct IntegrityAuditor {
    legacy_cleanup_hosts: Vec<String>,
}

impl IntegrityAuditor {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            legacy_cleanup_hosts: config.legacy_cleanup_hosts.clone(),
        }
    }

    /// Scans all feeds for url duplicates, case-insensitively. Never
    /// mutates anything.
    pub fn audit_feeds<S: Store>(&self, store: &S) -> Result<AuditSummary> {
        let mut summary = AuditSummary::default();
        let mut url_to_feed: HashMap<String, i64> = HashMap::new();

        for feed in store.get_all_feeds()? {
            let Some(id) = feed.id else { continue };
            let key = feed.url.to_lowercase();
            match url_to_feed.get(&key) {
                Some(&existing_id) => {
                    tracing::info!("Duplicate feed {} and {}, url {}", id, existing_id, key);
                    summary.findings.push(Finding::DuplicateFeedUrl {
                        url: key,
                        feed_ids: (existing_id, id),
                    });
                }
                None => {
                    url_to_feed.insert(key, id);
                }
            }
            summary.feeds_scanned += 1;
        }

        tracing::info!(
            "Scanned {} feeds. {}",
            summary.feeds_scanned,
            if summary.ok() {
                "No duplicate urls found."
            } else {
                "Duplicate urls found."
            }
        );
        Ok(summary)
    }

    /// Scans every feed's items through the three duplicate detectors.
    /// One feed's anomalies never stop the scan of the rest.
    pub fn audit_items<S: Store>(&self, store: &S) -> Result<AuditSummary> {
        let mut summary = AuditSummary::default();

        for feed in store.get_all_feeds()? {
            let Some(feed_id) = feed.id else { continue };
            match self.audit_feed_items(store, feed_id, &mut summary) {
                Ok(scanned) => summary.items_scanned += scanned,
                Err(e) => {
                    tracing::error!("Failed at auditing items of feed {}: {}", feed_id, e);
                }
            }
            summary.feeds_scanned += 1;
        }

        tracing::info!(
            "Scanned {} items of {} feeds. {}",
            summary.items_scanned,
            summary.feeds_scanned,
            if summary.ok() {
                "No duplicates found."
            } else {
                "Duplicates found."
            }
        );
        Ok(summary)
    }

    fn audit_feed_items<S: Store>(
        &self,
        store: &S,
        feed_id: i64,
        summary: &mut AuditSummary,
    ) -> Result<usize> {
        let items = store.get_items_by_feed(feed_id)?;

        let mut link_to_item: HashMap<String, &FeedItem> = HashMap::new();
        let mut title_pub_cont_to_item: HashMap<String, &FeedItem> = HashMap::new();
        let mut uri_to_item: HashMap<&str, &FeedItem> = HashMap::new();

        for item in &items {
            if let Some(key) = host_and_path(&item.link) {
                match link_to_item.get(key.as_str()) {
                    Some(existing) => {
                        summary
                            .findings
                            .push(link_finding(feed_id, existing, item, &key));
                    }
                    None => {
                        link_to_item.insert(key, item);
                    }
                }
            }

            let key = content_key(item);
            let collision = title_pub_cont_to_item
                .get(&key)
                .filter(|existing| uris_match_leniently(existing, item))
                .copied();
            match collision {
                Some(existing) => {
                    tracing::info!(
                        "Duplicate items {:?} and {:?} for title+published+content, link {}",
                        item.id,
                        existing.id,
                        item.link
                    );
                    let deleted_item = self.legacy_cleanup(store, existing, item)?;
                    if deleted_item.is_some() {
                        title_pub_cont_to_item.remove(&key);
                    }
                    summary.findings.push(Finding::DuplicateItemContent {
                        feed_id,
                        item_ids: (existing.id.unwrap_or_default(), item.id.unwrap_or_default()),
                        deleted_item,
                    });
                }
                None => {
                    title_pub_cont_to_item.insert(key, item);
                }
            }

            if let Some(uri) = item.uri.as_deref().filter(|u| !u.trim().is_empty()) {
                match uri_to_item.get(uri) {
                    Some(existing) => {
                        tracing::info!(
                            "Duplicate items {:?} and {:?} for uri {}",
                            item.id,
                            existing.id,
                            uri
                        );
                        summary.findings.push(Finding::DuplicateItemUri {
                            feed_id,
                            item_ids: (
                                existing.id.unwrap_or_default(),
                                item.id.unwrap_or_default(),
                            ),
                            uri: uri.to_string(),
                        });
                    }
                    None => {
                        uri_to_item.insert(uri, item);
                    }
                }
            }
        }

        Ok(items.len())
    }

    /// The one mutating path. Deletes the uri-less item of a content
    /// duplicate pair, but only for sources on the configured legacy
    /// list and only when exactly one of the two lacks a uri.
    fn legacy_cleanup<S: Store>(
        &self,
        store: &S,
        existing: &FeedItem,
        item: &FeedItem,
    ) -> Result<Option<i64>> {
        let host = base_url(&existing.link);
        if !self.legacy_cleanup_hosts.iter().any(|h| h == &host) {
            return Ok(None);
        }

        let to_delete = match (blank(&existing.uri), blank(&item.uri)) {
            (true, false) => existing,
            (false, true) => item,
            _ => return Ok(None),
        };
        let Some(id) = to_delete.id else {
            return Ok(None);
        };

        tracing::info!(
            "Deleting duplicate item {} without uri, link {}",
            id,
            to_delete.link
        );
        store.delete_item(id)?;
        Ok(Some(id))
    }
}

fn blank(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Compares through host+path when the value is a valid URL, verbatim
/// otherwise, so protocol changes do not mask a duplicate.
fn normalized(s: &str) -> String {
    if is_valid_url(s) {
        host_and_path(s).unwrap_or_else(|| s.to_string())
    } else {
        s.to_string()
    }
}

fn normalized_opt(s: &Option<String>) -> Option<String> {
    s.as_deref().map(normalized)
}

fn uris_match_leniently(a: &FeedItem, b: &FeedItem) -> bool {
    match (a.uri.as_deref(), b.uri.as_deref()) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn content_key(item: &FeedItem) -> String {
    let published = item
        .published_at
        .map(|t| t.timestamp_millis())
        .unwrap_or(i64::MAX);
    format!("{}{}{}", item.title, published, item.content_hash())
}

fn classify_link_collision(existing: &FeedItem, item: &FeedItem) -> LinkVerdict {
    let links_match = normalized(&existing.link) == normalized(&item.link);
    let uris_match = normalized_opt(&existing.uri) == normalized_opt(&item.uri);
    if existing.title != item.title || !links_match || !uris_match {
        return LinkVerdict::Distinct;
    }
    if existing.content == item.content {
        return LinkVerdict::ExactDuplicate;
    }
    if eq_ignoring_mins_secs(existing.published_at, item.published_at)
        && existing.author == item.author
    {
        return LinkVerdict::NearDuplicate;
    }
    LinkVerdict::Distinct
}

fn link_finding(feed_id: i64, existing: &FeedItem, item: &FeedItem, key: &str) -> Finding {
    match classify_link_collision(existing, item) {
        LinkVerdict::ExactDuplicate | LinkVerdict::NearDuplicate => {
            // The older item by created date is the removable one.
            let (keep, remove) = if existing.created_at > item.created_at {
                (existing, item)
            } else {
                (item, existing)
            };
            tracing::info!(
                "Items {:?} and {:?} equal, removable one created at {}",
                item.id,
                existing.id,
                remove.created_at
            );
            Finding::RemovableItemDuplicate {
                feed_id,
                keep_id: keep.id.unwrap_or_default(),
                remove_id: remove.id.unwrap_or_default(),
            }
        }
        LinkVerdict::Distinct => {
            tracing::info!(
                "Duplicate items {:?} and {:?} for link key {}",
                item.id,
                existing.id,
                key
            );
            Finding::DuplicateItemLink {
                feed_id,
                item_ids: (existing.id.unwrap_or_default(), item.id.unwrap_or_default()),
                key: key.to_string(),
            }
        }
    }
}
