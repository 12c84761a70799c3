//! Command handlers. Each one prints for the operator and returns a
//! `Result` for the process exit code; structured logging stays on the
//! `tracing` side.

use std::path::PathBuf;
use std::sync::Arc;

use crate::app::{AppContext, FreshetError, Result};
use crate::audit::AuditSummary;
use crate::config::SyncInterval;
use crate::daemon::{daemon_status, stop_daemon, Daemon, DaemonConfig};
use crate::pipeline::{BatchDriver, SyncOutcome};
use crate::store::Store;
use crate::util::url::trim_url;

pub async fn add(ctx: &AppContext, url: &str) -> Result<()> {
    let trimmed = trim_url(url);
    if !crate::util::url::is_valid_url(&trimmed) {
        return Err(FreshetError::Other(format!(
            "Not a valid http(s) url: {}",
            trimmed
        )));
    }
    if ctx.store.get_feed_by_url(&trimmed)?.is_some() {
        println!("Already subscribed to {}", trimmed);
        return Ok(());
    }

    match ctx.pipeline.sync_url(ctx.store.as_ref(), &trimmed).await? {
        SyncOutcome::Synced { inserted, .. } => {
            let feed = ctx
                .store
                .get_feed_by_url(&trimmed)?
                .ok_or_else(|| FreshetError::FeedNotFound(trimmed.clone()))?;
            println!("Added {} ({} items)", feed.display_name(), inserted);
        }
        SyncOutcome::Failed { message } => {
            // The record exists with the failure noted; the next sync
            // retries after the backoff.
            println!("Added {} but the first fetch failed: {}", trimmed, message);
        }
        SyncOutcome::Skipped => println!("Added {}", trimmed),
    }
    Ok(())
}

pub fn remove(ctx: &AppContext, url: &str) -> Result<()> {
    let trimmed = trim_url(url);
    let feed = ctx
        .store
        .get_feed_by_url(&trimmed)?
        .ok_or_else(|| FreshetError::FeedNotFound(trimmed.clone()))?;
    let id = feed
        .id
        .ok_or_else(|| FreshetError::FeedNotFound(trimmed.clone()))?;

    let items = ctx.store.item_count_for_feed(id)?;
    ctx.store.delete_feed(id)?;
    println!("Removed {} and {} items", feed.display_name(), items);
    Ok(())
}

pub fn list(ctx: &AppContext, with_items: bool) -> Result<()> {
    let feeds = ctx.store.get_all_feeds()?;
    if feeds.is_empty() {
        println!("No feeds. Add one with: freshet add <url>");
        return Ok(());
    }

    for feed in feeds {
        let Some(id) = feed.id else { continue };
        let count = ctx.store.item_count_for_feed(id)?;
        let last_ok = feed
            .last_ok_fetch
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<40} {:>5} items  last ok: {}  {}",
            feed.display_name(),
            count,
            last_ok,
            feed.url
        );
        if let Some(msg) = &feed.last_fail_msg {
            if crate::util::time::is_first_after_second(feed.last_failed_fetch, feed.last_ok_fetch)
            {
                println!("    last failure: {}", msg);
            }
        }

        if with_items {
            for item in ctx.store.get_items_by_feed(id)? {
                let published = item
                    .published_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "????-??-??".to_string());
                println!("    {} {}", published, item.display_title());
            }
        }
    }
    Ok(())
}

pub async fn sync(ctx: &AppContext, url: Option<&str>, workers: Option<usize>) -> Result<()> {
    match url {
        Some(url) => {
            let outcome = ctx.pipeline.sync_url(ctx.store.as_ref(), url).await?;
            print_outcome(url, &outcome);
            Ok(())
        }
        None => {
            let driver = match workers {
                Some(workers) => BatchDriver::with_workers(ctx.pipeline.clone(), workers),
                None => BatchDriver::with_workers(ctx.pipeline.clone(), ctx.config.sync.workers),
            };
            let results = driver.sync_all(ctx.store.clone()).await;

            let mut inserted = 0;
            let mut updated = 0;
            let mut skipped = 0;
            let mut failed = 0;
            for (feed_id, outcome) in &results {
                match outcome {
                    SyncOutcome::Synced {
                        inserted: i,
                        updated: u,
                    } => {
                        inserted += i;
                        updated += u;
                    }
                    SyncOutcome::Skipped => skipped += 1,
                    SyncOutcome::Failed { message } => {
                        failed += 1;
                        if let Some(feed) = ctx.store.get_feed(*feed_id)? {
                            println!("Failed {}: {}", feed.display_name(), message);
                        }
                    }
                }
            }
            println!(
                "Synced {} feeds: {} new, {} updated, {} skipped, {} failed",
                results.len(),
                inserted,
                updated,
                skipped,
                failed
            );
            Ok(())
        }
    }
}

fn print_outcome(url: &str, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Synced { inserted, updated } => {
            println!("Synced {}: {} new, {} updated", url, inserted, updated)
        }
        SyncOutcome::Skipped => println!("Skipped {} (not due yet)", url),
        SyncOutcome::Failed { message } => println!("Failed {}: {}", url, message),
    }
}

pub fn audit(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.auditor.audit_feeds(ctx.store.as_ref())?;
    let items = ctx.auditor.audit_items(ctx.store.as_ref())?;
    print_audit("Feeds", &feeds);
    print_audit("Items", &items);

    if !feeds.ok() || !items.ok() {
        println!(
            "{} findings. See the log for details.",
            feeds.findings.len() + items.findings.len()
        );
    }
    Ok(())
}

fn print_audit(label: &str, summary: &AuditSummary) {
    println!(
        "{}: scanned {} feeds / {} items, {}",
        label,
        summary.feeds_scanned,
        summary.items_scanned,
        if summary.ok() {
            "ok".to_string()
        } else {
            format!("{} findings", summary.findings.len())
        }
    );
}

/// Rewrites any stored url still carrying a trailing slash. A one-shot
/// maintenance pass for records predating the trim-on-write store.
pub fn trim_urls(ctx: &AppContext) -> Result<()> {
    let count = trim_feed_urls(ctx.store.as_ref())?;
    println!("{} feed urls trimmed", count);
    Ok(())
}

fn trim_feed_urls<S: Store>(store: &S) -> Result<usize> {
    let mut count = 0;
    for mut feed in store.get_all_feeds()? {
        let Some(id) = feed.id else { continue };
        let trimmed = trim_url(&feed.url);
        if trimmed != feed.url {
            tracing::info!("Trimming feed {} url '{}'", id, feed.url);
            feed.url = trimmed;
            store.update_feed(id, &feed)?;
            count += 1;
        }
    }
    Ok(count)
}

pub async fn daemon_start(
    ctx: Arc<AppContext>,
    interval: &str,
    log_file: Option<PathBuf>,
    no_initial_sync: bool,
) -> Result<()> {
    let sync_interval = SyncInterval::parse(interval).map_err(FreshetError::Config)?;
    if sync_interval.is_zero() {
        return Err(FreshetError::Config(format!(
            "Sync interval must be greater than zero: {}",
            interval
        )));
    }
    let config = DaemonConfig {
        sync_interval,
        sync_on_start: !no_initial_sync,
        log_file,
    };
    Daemon::new(ctx, config).run().await
}

pub fn daemon_stop() -> Result<()> {
    stop_daemon().map_err(FreshetError::Other)?;
    println!("Daemon stopped");
    Ok(())
}

pub fn daemon_show_status() {
    println!("{}", daemon_status());
}
