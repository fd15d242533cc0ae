use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::feed::fetcher::fetch_feed;
use crate::feed::parser::FeedItem;
use crate::storage::BlogRecord;

/// A request to poll one blog's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTask {
    /// Identity of the blog the feed belongs to
    pub owner: String,
    pub feed_url: String,
}

impl FeedTask {
    /// Task polling `blog`'s feed, owned by its catalog id.
    ///
    /// Authors are not unique; the catalog id is, so every blog gets its own
    /// actor and posts can be traced back to the blog.
    pub fn for_blog(blog: &BlogRecord) -> Self {
        Self {
            owner: blog.external_id.clone(),
            feed_url: blog.rss_url.clone(),
        }
    }
}

/// A post found while polling, tagged with the blog it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPost {
    pub owner: String,
    pub item: FeedItem,
}

#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Bound of the shared task queue
    pub queue_capacity: usize,
    /// Bound of the output channel of discovered posts
    pub output_capacity: usize,
    /// Maximum number of feeds fetched at the same time
    pub max_concurrent: usize,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            output_capacity: 1024,
            max_concurrent: 10,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Feed poller has shut down")]
    Closed,
}

/// Counts reported when the poller shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    /// Tasks that were processed, successfully or not
    pub tasks: usize,
    /// Tasks whose feed could not be fetched or parsed
    pub failed: usize,
    /// Posts forwarded to the output channel
    pub posts: usize,
}

/// Polls blog feeds and streams discovered posts to a single consumer.
///
/// Every owner gets its own actor task, created on its first [`FeedTask`],
/// which handles that owner's tasks one at a time. Actors of different
/// owners run concurrently, bounded by [`PollerOptions::max_concurrent`].
/// A failed fetch is logged and dropped; it never affects other actors and
/// is not retried.
///
/// # Example
///
/// ```ignore
/// let (poller, mut posts) = FeedPoller::start(client, PollerOptions::default());
/// poller.submit(FeedTask { owner: "ann".into(), feed_url: url }).await?;
///
/// tokio::spawn(async move {
///     while let Some(post) = posts.recv().await {
///         store(post).await;
///     }
/// });
///
/// let summary = poller.shutdown().await;
/// ```
pub struct FeedPoller {
    tasks: mpsc::Sender<FeedTask>,
    dispatcher: JoinHandle<PollSummary>,
}

struct PollContext {
    client: reqwest::Client,
    timeout: Duration,
    permits: Semaphore,
    posts: mpsc::Sender<DiscoveredPost>,
    handled: AtomicUsize,
    failed: AtomicUsize,
    emitted: AtomicUsize,
}

impl PollContext {
    fn summary(&self) -> PollSummary {
        PollSummary {
            tasks: self.handled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            posts: self.emitted.load(Ordering::Relaxed),
        }
    }
}

impl FeedPoller {
    /// Starts the dispatcher and returns the receiving end of the post stream.
    ///
    /// The receiver must be drained; once it is full, actors wait before
    /// fetching further feeds.
    pub fn start(
        client: reqwest::Client,
        options: PollerOptions,
    ) -> (Self, mpsc::Receiver<DiscoveredPost>) {
        let (task_tx, task_rx) = mpsc::channel(options.queue_capacity.max(1));
        let (post_tx, post_rx) = mpsc::channel(options.output_capacity.max(1));

        let ctx = Arc::new(PollContext {
            client,
            timeout: options.timeout,
            permits: Semaphore::new(options.max_concurrent.max(1)),
            posts: post_tx,
            handled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            emitted: AtomicUsize::new(0),
        });

        let dispatcher = tokio::spawn(dispatch(task_rx, ctx));

        (
            Self {
                tasks: task_tx,
                dispatcher,
            },
            post_rx,
        )
    }

    /// Queues a task, waiting while the queue is full.
    pub async fn submit(&self, task: FeedTask) -> Result<(), PollerError> {
        self.tasks.send(task).await.map_err(|_| PollerError::Closed)
    }

    /// Stops accepting tasks and waits until every queued task is handled.
    ///
    /// The post stream closes once this returns.
    pub async fn shutdown(self) -> PollSummary {
        drop(self.tasks);
        match self.dispatcher.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Feed poller dispatcher failed");
                PollSummary::default()
            }
        }
    }
}

/// Routes tasks to per-owner actors until the task queue closes.
async fn dispatch(mut tasks: mpsc::Receiver<FeedTask>, ctx: Arc<PollContext>) -> PollSummary {
    // Unbounded: routing must never wait on one owner's backlog. The shared
    // task queue and the fetch semaphore bound the work.
    let mut actors: HashMap<String, mpsc::UnboundedSender<String>> = HashMap::new();
    let mut running = JoinSet::new();

    while let Some(FeedTask { owner, feed_url }) = tasks.recv().await {
        let inbox = actors.entry(owner.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            running.spawn(run_actor(owner.clone(), rx, Arc::clone(&ctx)));
            tx
        });

        if inbox.send(feed_url).is_err() {
            // Actor is gone (it panicked); the next task for this owner respawns it
            tracing::warn!(owner = %owner, "Feed actor stopped, task dropped");
            actors.remove(&owner);
        }
    }

    // Closing the inboxes lets every actor finish its backlog and exit
    drop(actors);
    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Feed actor panicked");
        }
    }

    let summary = ctx.summary();
    tracing::info!(
        tasks = summary.tasks,
        failed = summary.failed,
        posts = summary.posts,
        "Feed polling finished"
    );
    summary
}

async fn run_actor(
    owner: String,
    mut inbox: mpsc::UnboundedReceiver<String>,
    ctx: Arc<PollContext>,
) {
    while let Some(feed_url) = inbox.recv().await {
        let Ok(_permit) = ctx.permits.acquire().await else {
            return;
        };
        poll_feed(&ctx, &owner, &feed_url).await;
    }
}

async fn poll_feed(ctx: &PollContext, owner: &str, feed_url: &str) {
    ctx.handled.fetch_add(1, Ordering::Relaxed);

    let feed = match fetch_feed(&ctx.client, feed_url, ctx.timeout).await {
        Ok(feed) => feed,
        Err(e) => {
            ctx.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(owner = %owner, feed = %feed_url, error = %e, "Feed unreachable");
            return;
        }
    };

    tracing::debug!(owner = %owner, feed = %feed_url, items = feed.items.len(), "Feed polled");

    for item in feed.items {
        let post = DiscoveredPost {
            owner: owner.to_string(),
            item,
        };
        if ctx.posts.send(post).await.is_err() {
            tracing::debug!(owner = %owner, "Post consumer dropped, discarding remaining items");
            return;
        }
        ctx.emitted.fetch_add(1, Ordering::Relaxed);
    }
}
