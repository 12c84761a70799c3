use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::pipeline::{SyncOutcome, SyncPipeline};
use crate::store::Store;

pub const DEFAULT_WORKERS: usize = 10;

/// Fans a batch of feed syncs out over a bounded worker pool. The
/// semaphore caps concurrent fetches; every feed still gets its own
/// task so one slow host cannot stall the rest of the batch.
pub struct BatchDriver {
    pipeline: Arc<SyncPipeline>,
    semaphore: Arc<Semaphore>,
}

impl BatchDriver {
    pub fn new(pipeline: Arc<SyncPipeline>) -> Self {
        Self::with_workers(pipeline, DEFAULT_WORKERS)
    }

    pub fn with_workers(pipeline: Arc<SyncPipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Syncs every feed in the store, in parallel, returning one outcome
    /// per feed. Per-feed failures are outcomes, not errors; a feed is
    /// dropped from the result only if its task panics.
    pub async fn sync_all<S: Store + Send + Sync + 'static>(
        &self,
        store: Arc<S>,
    ) -> Vec<(i64, SyncOutcome)> {
        let feeds = match store.get_all_feeds() {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!("Failed at listing feeds: {}", e);
                return Vec::new();
            }
        };
        let ids = feeds.into_iter().filter_map(|f| f.id).collect();
        self.sync_ids(ids, store).await
    }

    pub async fn sync_ids<S: Store + Send + Sync + 'static>(
        &self,
        feed_ids: Vec<i64>,
        store: Arc<S>,
    ) -> Vec<(i64, SyncOutcome)> {
        let mut handles = Vec::new();

        for feed_id in feed_ids {
            let pipeline = self.pipeline.clone();
            let semaphore = self.semaphore.clone();
            let store = store.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("Semaphore closed");

                let outcome = match pipeline.sync_feed(store.as_ref(), feed_id).await {
                    Ok(outcome) => outcome,
                    Err(e) => SyncOutcome::Failed {
                        message: e.to_string(),
                    },
                };
                (feed_id, outcome)
            });

            handles.push(handle);
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Result;
    use crate::fetcher::{FeedFetcher, FetchedFeed, RawEntry};
    use crate::policy::RefreshPolicy;
    use crate::store::{SqliteStore, Store as _};
    use async_trait::async_trait;

    struct PerUrlFetcher;

    #[async_trait]
    impl FeedFetcher for PerUrlFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
            Ok(FetchedFeed {
                title: Some(format!("Feed at {}", url)),
                entries: vec![RawEntry {
                    title: Some("hello".into()),
                    link: Some(format!("{}/hello", url)),
                    uri: Some(format!("{}/hello", url)),
                    summary: Some("hi".into()),
                    ..Default::default()
                }],
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_sync_all_covers_every_feed() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        for i in 0..5 {
            store
                .insert_feed(&crate::domain::Feed::new(&format!(
                    "http://example.com/feed-{}",
                    i
                )))
                .unwrap();
        }

        let pipeline = Arc::new(SyncPipeline::new(
            Arc::new(PerUrlFetcher),
            RefreshPolicy::default(),
        ));
        let driver = BatchDriver::with_workers(pipeline, 2);

        let results = driver.sync_all(store.clone()).await;
        assert_eq!(results.len(), 5);
        for (_, outcome) in &results {
            assert_eq!(
                *outcome,
                SyncOutcome::Synced {
                    inserted: 1,
                    updated: 0
                }
            );
        }
        assert_eq!(store.item_count().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_sync_all_empty_store() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let pipeline = Arc::new(SyncPipeline::new(
            Arc::new(PerUrlFetcher),
            RefreshPolicy::default(),
        ));
        let driver = BatchDriver::new(pipeline);

        let results = driver.sync_all(store).await;
        assert!(results.is_empty());
    }
}
