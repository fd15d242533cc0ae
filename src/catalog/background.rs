use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::fetcher::CatalogFetcher;

/// Pending refresh requests; more are coalesced into the one already queued.
const REQUEST_QUEUE_CAPACITY: usize = 1;

/// Runs refresh cycles on a dedicated background task.
///
/// Requests are handled one at a time, each through the fetcher's guarded
/// [`CatalogFetcher::refresh`], so cycles started here never overlap each
/// other or a cycle started elsewhere.
pub struct BackgroundRefresher {
    requests: mpsc::Sender<()>,
    worker: JoinHandle<()>,
}

impl BackgroundRefresher {
    pub fn spawn(fetcher: Arc<CatalogFetcher>) -> Self {
        let (requests, mut rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);

        let worker = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                if let Some(report) = fetcher.refresh().await {
                    tracing::debug!(finished_at = %report.finished_at, "Background refresh finished");
                }
            }
        });

        Self { requests, worker }
    }

    /// Ask for a refresh cycle without waiting for it.
    ///
    /// Returns `false` if a request is already pending or the worker has
    /// stopped.
    pub fn request_refresh(&self) -> bool {
        match self.requests.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                tracing::debug!("Refresh already pending, request coalesced");
                false
            }
            Err(TrySendError::Closed(())) => {
                tracing::warn!("Background refresher has stopped");
                false
            }
        }
    }

    /// Stop accepting requests and wait for pending ones to finish.
    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Background refresher task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSources, FetcherOptions};
    use crate::storage::Database;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn fetcher(server: &MockServer) -> Arc<CatalogFetcher> {
        let db = Database::open(":memory:").await.unwrap();
        let sources = CatalogSources {
            personal: Some(format!("{}/personal.json", server.uri())),
            ..CatalogSources::default()
        };
        Arc::new(CatalogFetcher::new(
            db,
            reqwest::Client::new(),
            sources,
            FetcherOptions::default(),
        ))
    }

    #[tokio::test]
    async fn test_request_runs_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/personal.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"bloggers":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(&server).await;
        let refresher = BackgroundRefresher::spawn(fetcher.clone());

        assert!(refresher.request_refresh());
        refresher.shutdown().await;

        assert!(fetcher.last_fetched().await.unwrap().is_some());
        assert!(!fetcher.is_refreshing());
    }

    #[tokio::test]
    async fn test_requests_never_overlap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/personal.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"bloggers":[]}"#)
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher(&server).await;
        let refresher = BackgroundRefresher::spawn(fetcher.clone());

        assert!(refresher.request_refresh());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fetcher.is_refreshing());

        // One request may wait behind the running cycle; the rest coalesce.
        assert!(refresher.request_refresh());
        assert!(!refresher.request_refresh());

        refresher.shutdown().await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }
}
