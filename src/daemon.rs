//! Background daemon for periodic feed synchronization.
//!
//! Runs the batch driver on a fixed timer without requiring system
//! scheduler configuration. The refresh policy still applies per feed,
//! so a short timer does not translate into hammering sources.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::time::interval;

use crate::app::AppContext;
use crate::config::SyncInterval;
use crate::pipeline::SyncOutcome;
use crate::store::Store;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// How often to run a sync cycle (default: 1 hour)
    pub sync_interval: SyncInterval,
    /// Whether to run a sync immediately on start
    pub sync_on_start: bool,
    /// Log file path (None = stdout)
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_interval: SyncInterval::new(0, 1, 0),
            sync_on_start: true,
            log_file: None,
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self {
            ctx,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("freshet").join("daemon.pid"))
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        if let Some(pid_path) = Self::pid_file_path() {
            if pid_path.exists() {
                if let Ok(pid_str) = fs::read_to_string(&pid_path) {
                    if let Ok(pid) = pid_str.trim().parse::<u32>() {
                        return Self::process_exists(pid);
                    }
                }
            }
        }
        false
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    /// Write PID file
    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    /// Remove PID file
    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Log a message with timestamp
    fn log(&self, msg: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{}] {}", timestamp, msg);

        if let Some(ref log_path) = self.config.log_file {
            if let Ok(mut file) = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
            {
                let _ = writeln!(file, "{}", line);
            }
        } else {
            println!("{}", line);
        }
    }

    /// Run the daemon
    pub async fn run(&self) -> crate::app::Result<()> {
        if Self::is_running() {
            return Err(crate::app::FreshetError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file().map_err(|e| {
            crate::app::FreshetError::Other(format!("Failed to write PID file: {}", e))
        })?;

        // Graceful shutdown on SIGTERM/SIGINT
        let running = self.running.clone();

        #[cfg(unix)]
        {
            let running_clone = running.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("Failed to set up SIGTERM handler");
                let mut sigint =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                        .expect("Failed to set up SIGINT handler");

                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
                running_clone.store(false, Ordering::SeqCst);
            });
        }

        #[cfg(windows)]
        {
            let running_clone = running.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                running_clone.store(false, Ordering::SeqCst);
            });
        }

        self.log(&format!(
            "Freshet daemon started (sync interval: {}, PID: {})",
            self.config.sync_interval,
            std::process::id()
        ));

        if self.config.sync_on_start {
            self.log("Running initial sync...");
            self.run_sync().await;
        }

        let mut timer = interval(self.config.sync_interval.as_duration());
        timer.tick().await; // Skip the first immediate tick

        while self.running.load(Ordering::SeqCst) {
            timer.tick().await;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.log("Running scheduled sync...");
            self.run_sync().await;
        }

        self.log("Daemon shutting down...");
        self.remove_pid_file();

        Ok(())
    }

    /// Run a single sync cycle across all feeds.
    async fn run_sync(&self) {
        let start = Utc::now();

        let results = self.ctx.driver.sync_all(self.ctx.store.clone()).await;
        if results.is_empty() {
            self.log("No feeds to sync");
            return;
        }

        let mut inserted = 0;
        let mut updated = 0;
        let mut skipped = 0;
        let mut failed = 0;

        for (feed_id, outcome) in results {
            match outcome {
                SyncOutcome::Synced {
                    inserted: i,
                    updated: u,
                } => {
                    inserted += i;
                    updated += u;
                    if i > 0 {
                        if let Ok(Some(feed)) = self.ctx.store.get_feed(feed_id) {
                            self.log(&format!("  {} new items from {}", i, feed.display_name()));
                        }
                    }
                }
                SyncOutcome::Skipped => skipped += 1,
                SyncOutcome::Failed { message } => {
                    failed += 1;
                    if let Ok(Some(feed)) = self.ctx.store.get_feed(feed_id) {
                        self.log(&format!(
                            "  Error syncing {}: {}",
                            feed.display_name(),
                            message
                        ));
                    }
                }
            }
        }

        let elapsed = Utc::now().signed_duration_since(start);
        self.log(&format!(
            "Sync complete: {} new, {} updated, {} skipped, {} failed ({:.1}s)",
            inserted,
            updated,
            skipped,
            failed,
            elapsed.num_milliseconds() as f64 / 1000.0
        ));
    }

    /// Stop the daemon (called externally)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> Result<(), String> {
    let pid_path =
        Daemon::pid_file_path().ok_or_else(|| "Could not determine PID file path".to_string())?;

    if !pid_path.exists() {
        return Err("No daemon is running (PID file not found)".to_string());
    }

    let pid_str =
        fs::read_to_string(&pid_path).map_err(|e| format!("Failed to read PID file: {}", e))?;

    let pid: u32 = pid_str
        .trim()
        .parse()
        .map_err(|_| "Invalid PID in PID file".to_string())?;

    #[cfg(unix)]
    {
        use std::process::Command;
        let status = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status()
            .map_err(|e| format!("Failed to send signal: {}", e))?;

        if status.success() {
            let _ = fs::remove_file(&pid_path);
            Ok(())
        } else {
            Err(format!("Failed to stop daemon (PID {})", pid))
        }
    }

    #[cfg(windows)]
    {
        use std::process::Command;
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .status()
            .map_err(|e| format!("Failed to stop process: {}", e))?;

        if status.success() {
            let _ = fs::remove_file(&pid_path);
            Ok(())
        } else {
            Err(format!("Failed to stop daemon (PID {})", pid))
        }
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    if let Some(pid_path) = Daemon::pid_file_path() {
        if pid_path.exists() {
            if let Ok(pid_str) = fs::read_to_string(&pid_path) {
                if let Ok(pid) = pid_str.trim().parse::<u32>() {
                    if Daemon::process_exists(pid) {
                        return format!("Daemon is running (PID: {})", pid);
                    } else {
                        return "Daemon is not running (stale PID file)".to_string();
                    }
                }
            }
        }
    }
    "Daemon is not running".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_syncs_hourly() {
        let config = DaemonConfig::default();
        assert_eq!(config.sync_interval.as_duration().as_secs(), 3600);
        assert!(config.sync_on_start);
        assert!(config.log_file.is_none());
    }
}
