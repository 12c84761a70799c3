//! Refresh-eligibility policy.
//!
//! Decides whether a feed is due for another fetch. Read-only: nothing
//! here writes to the store.

use chrono::Utc;

use crate::app::Result;
use crate::config::{RefreshConfig, SyncInterval};
use crate::store::Store;

/// Outcome of a policy check. `found = false` means the feed id has no
/// record at all, which also forces `eligible = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDecision {
    pub eligible: bool,
    pub found: bool,
}

#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    success_interval: SyncInterval,
    failure_backoff: SyncInterval,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::new(&RefreshConfig::default())
    }
}

impl RefreshPolicy {
    pub fn new(config: &RefreshConfig) -> Self {
        Self {
            success_interval: config.success_interval,
            failure_backoff: config.failure_backoff,
        }
    }

    /// A feed is eligible once `success_interval` has elapsed since its
    /// last successful fetch (a feed that never succeeded is always past
    /// that point). A feed with a failure on record additionally waits
    /// out `failure_backoff` from the failure before being retried.
    pub fn can_refresh<S: Store>(&self, store: &S, feed_id: i64) -> Result<RefreshDecision> {
        let Some(feed) = store.get_feed(feed_id)? else {
            tracing::warn!("No feed found with id {}", feed_id);
            return Ok(RefreshDecision {
                eligible: false,
                found: false,
            });
        };

        let now = Utc::now();

        let mut eligible = match feed.last_ok_fetch {
            Some(last_ok) => now > last_ok + self.success_interval.as_chrono(),
            None => true,
        };

        if eligible {
            if let Some(last_failed) = feed.last_failed_fetch {
                eligible = now > last_failed + self.failure_backoff.as_chrono();
            }
        }

        tracing::info!(
            "{} refresh feed {} (last ok: {:?}, last failed: {:?} {})",
            if eligible { "Can" } else { "Can't" },
            feed_id,
            feed.last_ok_fetch,
            feed.last_failed_fetch,
            feed.last_fail_msg.as_deref().unwrap_or(""),
        );

        Ok(RefreshDecision {
            eligible,
            found: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Feed;
    use crate::store::SqliteStore;
    use chrono::{Duration, Utc};

    fn policy() -> RefreshPolicy {
        RefreshPolicy::default() // 4h success interval, 7d failure backoff
    }

    fn stored_feed(store: &SqliteStore, feed: Feed) -> i64 {
        store.insert_feed(&feed).unwrap()
    }

    #[test]
    fn test_missing_feed_not_found_not_eligible() {
        let store = SqliteStore::in_memory().unwrap();
        let decision = policy().can_refresh(&store, 999).unwrap();
        assert!(!decision.found);
        assert!(!decision.eligible);
    }

    #[test]
    fn test_never_fetched_is_eligible() {
        let store = SqliteStore::in_memory().unwrap();
        let id = stored_feed(&store, Feed::new("http://example.com/feed"));

        let decision = policy().can_refresh(&store, id).unwrap();
        assert!(decision.found);
        assert!(decision.eligible);
    }

    #[test]
    fn test_just_fetched_not_eligible() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = Feed::new("http://example.com/feed");
        feed.last_ok_fetch = Some(Utc::now());
        let id = stored_feed(&store, feed);

        let decision = policy().can_refresh(&store, id).unwrap();
        assert!(decision.found);
        assert!(!decision.eligible);
    }

    #[test]
    fn test_stale_fetch_is_eligible() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = Feed::new("http://example.com/feed");
        feed.last_ok_fetch = Some(Utc::now() - Duration::hours(5));
        let id = stored_feed(&store, feed);

        let decision = policy().can_refresh(&store, id).unwrap();
        assert!(decision.eligible);
    }

    #[test]
    fn test_recent_failure_blocks_even_when_success_interval_elapsed() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = Feed::new("http://example.com/feed");
        feed.last_ok_fetch = Some(Utc::now() - Duration::days(2));
        feed.last_failed_fetch = Some(Utc::now() - Duration::days(1));
        let id = stored_feed(&store, feed);

        let decision = policy().can_refresh(&store, id).unwrap();
        assert!(decision.found);
        assert!(!decision.eligible);
    }

    #[test]
    fn test_old_failure_does_not_block() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = Feed::new("http://example.com/feed");
        feed.last_ok_fetch = Some(Utc::now() - Duration::days(2));
        feed.last_failed_fetch = Some(Utc::now() - Duration::days(8));
        let id = stored_feed(&store, feed);

        let decision = policy().can_refresh(&store, id).unwrap();
        assert!(decision.eligible);
    }

    #[test]
    fn test_never_fetched_eligible_regardless_of_interval() {
        let store = SqliteStore::in_memory().unwrap();
        let id = stored_feed(&store, Feed::new("http://example.com/feed"));

        let config = RefreshConfig {
            success_interval: SyncInterval::new(365, 0, 0),
            failure_backoff: SyncInterval::new(365, 0, 0),
        };
        let decision = RefreshPolicy::new(&config).can_refresh(&store, id).unwrap();
        assert!(decision.eligible);
    }
}
