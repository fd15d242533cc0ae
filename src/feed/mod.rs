//! Feed access: downloading, parsing, validating and polling RSS/Atom feeds.
//!
//! - [`fetcher`] - HTTP download with timeout and size limit, no retries
//! - [`parser`] - feed parsing using the `feed-rs` crate
//! - [`validator`] - resolves a feed URL to the site it belongs to
//! - [`poller`] - per-blog actors that stream discovered posts
//!
//! # Example
//!
//! ```ignore
//! use blogsync::feed::{FeedPoller, FeedTask, PollerOptions};
//!
//! let (poller, mut posts) = FeedPoller::start(client, PollerOptions::default());
//! poller.submit(FeedTask { owner, feed_url }).await?;
//! while let Some(post) = posts.recv().await { /* hand to post storage */ }
//! ```

mod fetcher;
mod parser;
mod poller;
mod validator;

pub(crate) use fetcher::download;
pub use fetcher::{fetch_feed, FetchError};
pub use parser::{parse_feed, FeedItem, ParsedFeed};
pub use poller::{DiscoveredPost, FeedPoller, FeedTask, PollSummary, PollerError, PollerOptions};
pub use validator::FeedValidator;
