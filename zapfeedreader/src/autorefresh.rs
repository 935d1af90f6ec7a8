use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::{Row, SqlitePool};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::error::Result;
use crate::local::sources;
use crate::model::{parse_date, Feed, SourceType};

const INITIAL_DELAY: Duration = Duration::from_secs(5);
const TICK_PERIOD: Duration = Duration::from_secs(60);

/// The periodic loop that enqueues refresh jobs for feeds whose
/// `lastChecked + interval` has passed. The loop itself mutates nothing; all
/// writes happen inside the refresh jobs it schedules through the agent.
pub struct AutoRefresh {
    enabled: Arc<AtomicBool>,
    default_interval_seconds: Arc<AtomicU64>,
}

impl AutoRefresh {
    /// Starts the loop: first pass after 5 seconds, then once a minute.
    /// `feed_refreshed` is invoked from the refresh jobs as they complete.
    pub fn start(
        pool: SqlitePool,
        agent: Agent,
        shutdown: Arc<Notify>,
        enabled: bool,
        default_interval_seconds: u64,
        feed_refreshed: impl Fn(Result<Feed>) + Send + Sync + 'static,
    ) -> Self {
        let enabled = Arc::new(AtomicBool::new(enabled));
        let interval = Arc::new(AtomicU64::new(default_interval_seconds));
        let callback: Arc<dyn Fn(Result<Feed>) + Send + Sync> = Arc::new(feed_refreshed);

        let loop_enabled = enabled.clone();
        let loop_interval = interval.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(INITIAL_DELAY) => {}
                _ = shutdown.notified() => return,
            }
            loop {
                if loop_enabled.load(Ordering::SeqCst) {
                    if let Err(e) =
                        tick(&pool, &agent, loop_interval.load(Ordering::SeqCst), callback.clone()).await
                    {
                        debug!("autorefresh: tick failed: {e}");
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(TICK_PERIOD) => {}
                    _ = shutdown.notified() => {
                        info!("autorefresh: shutdown requested, exiting loop");
                        return;
                    }
                }
            }
        });

        Self {
            enabled,
            default_interval_seconds: interval,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_default_interval_seconds(&self, seconds: u64) {
        self.default_interval_seconds.store(seconds, Ordering::SeqCst);
    }
}

/// One pass: enqueue a refresh job for every stale feed of every local source.
async fn tick(
    pool: &SqlitePool,
    agent: &Agent,
    default_interval_seconds: u64,
    callback: Arc<dyn Fn(Result<Feed>) + Send + Sync>,
) -> Result<()> {
    let now = chrono::Utc::now();

    for source in sources::list(pool, Some(SourceType::Local)).await? {
        let rows = sqlx::query("SELECT id, lastChecked, refreshInterval FROM feeds")
            .fetch_all(pool)
            .await?;

        for row in rows {
            let feed_id: i64 = row.get("id");
            let last_checked: String = row.get("lastChecked");
            let refresh_interval: Option<i64> = row.get("refreshInterval");

            // never-checked or unparseable timestamps are skipped; the first
            // manual refresh gives the feed a valid lastChecked
            let last_checked = match parse_date(&last_checked) {
                Some(dt) => dt,
                None => continue,
            };

            let interval_seconds = refresh_interval
                .filter(|i| *i > 0)
                .map(|i| i as u64)
                .unwrap_or(default_interval_seconds);
            let next_check = last_checked + chrono::Duration::seconds(interval_seconds.min(i64::MAX as u64) as i64);

            if next_check < now {
                debug!(feed_id, "autorefresh: feed is stale, enqueueing refresh");
                let cb = callback.clone();
                agent.queue_refresh_feed(source.id, feed_id, move |result| cb(result));
            }
        }
    }

    Ok(())
}
