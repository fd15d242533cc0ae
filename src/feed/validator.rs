use std::time::Duration;

use crate::feed::fetcher::fetch_feed;
use crate::util::validate_url;

/// Resolves a blog's canonical site address from its feed.
///
/// A feed URL is considered valid when it can be downloaded, parses as
/// RSS/Atom, and declares an http(s) link to its site. Anything else is
/// reported as `None`; failures never escape as errors.
#[derive(Clone)]
pub struct FeedValidator {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedValidator {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Returns the feed's declared site link, or `None` if the feed at
    /// `rss_url` is unreachable, unparseable, or declares no usable link.
    pub async fn resolve(&self, rss_url: &str) -> Option<String> {
        let url = match validate_url(rss_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(rss = %rss_url, error = %e, "Feed URL rejected");
                return None;
            }
        };

        let feed = match fetch_feed(&self.client, url.as_str(), self.timeout).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::debug!(rss = %rss_url, error = %e, "Feed could not be fetched");
                return None;
            }
        };

        let link = feed.site_link?;
        match validate_url(&link) {
            Ok(_) => Some(link),
            Err(e) => {
                tracing::debug!(rss = %rss_url, link = %link, error = %e, "Feed declares an unusable site link");
                None
            }
        }
    }
}
