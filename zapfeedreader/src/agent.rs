use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::Result;
use crate::local::sources;
use crate::model::{Feed, FeedAndPostID, Folder, Post, PostFilter};

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type JobFn = Box<dyn FnOnce(JobContext) -> JobFuture + Send>;

struct Job {
    label: &'static str,
    run: JobFn,
}

/// Everything a job needs to construct the backend for its source.
#[derive(Clone)]
pub struct JobContext {
    pool: SqlitePool,
    icon_dir: PathBuf,
}

impl JobContext {
    /// Resolves a source id to the matching backend realisation.
    pub async fn backend_for(&self, source_id: i64) -> Result<Box<dyn Backend>> {
        let source = sources::get(&self.pool, source_id).await?;
        crate::backend_for_source(&self.pool, &self.icon_dir, &source)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

struct AgentInner {
    context: JobContext,
    queue: Mutex<VecDeque<Job>>,
    workers: Arc<Semaphore>,
    worker_count: usize,
    shutdown: Notify,
    stopping: AtomicBool,
}

/// The process-wide job scheduler: clients enqueue typed operations with a
/// completion callback; a periodic dispatcher tick drains the FIFO queue
/// into a bounded worker pool. Jobs are dispatched in submission order, but
/// callbacks may complete out of order.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

const DISPATCH_TICK: Duration = Duration::from_secs(1);

impl Agent {
    /// Builds the agent and starts its dispatcher. The worker pool is sized
    /// to the machine's available parallelism, with a floor of two.
    pub fn new(pool: SqlitePool, icon_dir: PathBuf) -> Self {
        let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2).max(2);
        let inner = Arc::new(AgentInner {
            context: JobContext { pool, icon_dir },
            queue: Mutex::new(VecDeque::new()),
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            shutdown: Notify::new(),
            stopping: AtomicBool::new(false),
        });

        let dispatcher_inner = inner.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(DISPATCH_TICK);
            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    _ = dispatcher_inner.shutdown.notified() => break,
                }
                dispatch_pending(&dispatcher_inner);
            }
            debug!("agent: dispatcher stopped");
        });

        Self { inner }
    }

    fn enqueue(&self, label: &'static str, run: JobFn) {
        if self.inner.stopping.load(Ordering::SeqCst) {
            debug!("agent: dropping job {label}, shutting down");
            return;
        }
        self.inner.queue.lock().unwrap().push_back(Job { label, run });
    }

    /// Stops accepting jobs, drains the queue, and waits for running workers.
    pub async fn shutdown(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        // keep dispatching until the queue is empty
        loop {
            let empty = self.inner.queue.lock().unwrap().is_empty();
            if empty {
                break;
            }
            dispatch_pending(&self.inner);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        // all permits available again means all workers are idle
        let _all = self
            .inner
            .workers
            .acquire_many(self.inner.worker_count as u32)
            .await;
        self.inner.shutdown.notify_waiters();
        info!("agent: shutdown complete");
    }

    pub fn queue_refresh_feed(
        &self,
        source_id: i64,
        feed_id: i64,
        callback: impl FnOnce(Result<Feed>) + Send + 'static,
    ) {
        self.enqueue(
            "refresh-feed",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.refresh_feed(feed_id).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    /// Refreshes every feed of the source; the callback fires once per feed.
    pub fn queue_refresh_all_feeds(
        &self,
        source_id: i64,
        callback: impl Fn(Result<Feed>) + Send + Sync + 'static,
    ) {
        self.enqueue(
            "refresh-all-feeds",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let feeds = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.get_feeds(false).await
                    }
                    .await;
                    match feeds {
                        Ok(feeds) => {
                            for feed in feeds {
                                let result = async {
                                    let backend = ctx.backend_for(source_id).await?;
                                    backend.refresh_feed(feed.id).await
                                }
                                .await;
                                callback(result);
                            }
                        }
                        Err(e) => callback(Err(e)),
                    }
                })
            }),
        );
    }

    pub fn queue_subscribe_feed(
        &self,
        source_id: i64,
        url: String,
        folder_id: i64,
        callback: impl FnOnce(Result<Feed>) + Send + 'static,
    ) {
        self.enqueue(
            "subscribe-feed",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.subscribe_feed(&url, folder_id).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    pub fn queue_remove_feed(&self, source_id: i64, feed_id: i64, callback: impl FnOnce(Result<()>) + Send + 'static) {
        self.enqueue(
            "remove-feed",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.delete_feed(feed_id).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    pub fn queue_remove_folder(&self, source_id: i64, folder_id: i64, callback: impl FnOnce(Result<()>) + Send + 'static) {
        self.enqueue(
            "remove-folder",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.delete_folder(folder_id).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    pub fn queue_add_folder(
        &self,
        source_id: i64,
        parent_folder_id: i64,
        title: String,
        callback: impl FnOnce(Result<Folder>) + Send + 'static,
    ) {
        self.enqueue(
            "add-folder",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.add_folder(&title, parent_folder_id).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    pub fn queue_get_posts(
        &self,
        source_id: i64,
        filter: PostFilter,
        callback: impl FnOnce(Result<(u64, Vec<Post>)>) + Send + 'static,
    ) {
        self.enqueue(
            "get-posts",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.get_posts(&filter).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    pub fn queue_get_post(
        &self,
        source_id: i64,
        feed_id: i64,
        post_id: i64,
        callback: impl FnOnce(Result<Post>) + Send + 'static,
    ) {
        self.enqueue(
            "get-post",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.get_post(feed_id, post_id).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    pub fn queue_mark_post_read(
        &self,
        source_id: i64,
        feed_id: i64,
        post_id: i64,
        callback: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        self.enqueue(
            "mark-post-read",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend
                            .set_posts_read_status(true, &[FeedAndPostID { feed_id, post_id }])
                            .await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }

    pub fn queue_mark_feed_read(
        &self,
        source_id: i64,
        feed_id: i64,
        max_post_id: u64,
        callback: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        self.enqueue(
            "mark-feed-read",
            Box::new(move |ctx| {
                Box::pin(async move {
                    let result = async {
                        let backend = ctx.backend_for(source_id).await?;
                        backend.mark_feed_read(feed_id, max_post_id).await
                    }
                    .await;
                    callback(result);
                })
            }),
        );
    }
}

/// Hands queued jobs to idle workers, in submission order, until either the
/// queue or the worker pool is exhausted.
fn dispatch_pending(inner: &Arc<AgentInner>) {
    loop {
        let permit = match inner.workers.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return, // no idle worker; retry on the next tick
        };

        let job = inner.queue.lock().unwrap().pop_front();
        let job = match job {
            Some(job) => job,
            None => return,
        };

        debug!("agent: dispatching job {}", job.label);
        let context = inner.context.clone();
        tokio::spawn(async move {
            (job.run)(context).await;
            drop(permit);
        });
    }
}
