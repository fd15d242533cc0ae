use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::guard::ConcurrencyGuard;
use super::reconciler::{CatalogReconciler, DEFAULT_RECONCILE_CONCURRENCY};
use super::types::{parse_catalog, CatalogEntry, UpdateStatistics};
use crate::feed::{download, FeedValidator, FetchError};
use crate::storage::{Category, Database, LAST_FETCHED_KEY};
use crate::util::{validate_url, UrlValidationError};

const MAX_CATALOG_SIZE: usize = 5 * 1024 * 1024; // 5MB

// ============================================================================
// Error Types
// ============================================================================

/// Why a category's catalog could not be reconciled.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to download catalog: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why a category was not attempted at all.
#[derive(Debug)]
pub enum SkipReason {
    /// No catalog URL configured, or it is not an http(s) URL
    InvalidUrl(UrlValidationError),
}

/// Result of one category within a refresh cycle.
#[derive(Debug)]
pub enum CategoryResult {
    Refreshed(UpdateStatistics),
    Skipped(SkipReason),
    Failed(CatalogError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidUrl(e) => write!(f, "no usable catalog URL ({})", e),
        }
    }
}

impl fmt::Display for CategoryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryResult::Refreshed(stats) => write!(f, "{}", stats),
            CategoryResult::Skipped(reason) => write!(f, "skipped: {}", reason),
            CategoryResult::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Everything one refresh cycle did, in category order.
#[derive(Debug)]
pub struct RefreshReport {
    pub categories: Vec<(Category, CategoryResult)>,
    pub finished_at: DateTime<Utc>,
}

impl RefreshReport {
    pub fn result(&self, category: Category) -> Option<&CategoryResult> {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, result)| result)
    }

    /// Statistics for `category`, if its catalog was reconciled.
    pub fn statistics(&self, category: Category) -> Option<&UpdateStatistics> {
        match self.result(category)? {
            CategoryResult::Refreshed(stats) => Some(stats),
            _ => None,
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Catalog location for each category. Any of them may be left unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogSources {
    pub personal: Option<String>,
    pub company: Option<String>,
    pub video: Option<String>,
}

impl CatalogSources {
    pub fn url_for(&self, category: Category) -> Option<&str> {
        match category {
            Category::Personal => self.personal.as_deref(),
            Category::Company => self.company.as_deref(),
            Category::Video => self.video.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Limit for each catalog and feed request
    pub timeout: Duration,
    /// Catalog entries reconciled at once
    pub reconcile_concurrency: usize,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            reconcile_concurrency: DEFAULT_RECONCILE_CONCURRENCY,
        }
    }
}

// ============================================================================
// Catalog Fetcher
// ============================================================================

/// Downloads the three catalogs and reconciles each into the blog registry.
///
/// Refresh cycles never overlap: a call made while a cycle is running
/// returns immediately with `None`.
pub struct CatalogFetcher {
    db: Database,
    client: reqwest::Client,
    sources: CatalogSources,
    timeout: Duration,
    reconciler: CatalogReconciler,
    guard: ConcurrencyGuard,
}

impl CatalogFetcher {
    pub fn new(
        db: Database,
        client: reqwest::Client,
        sources: CatalogSources,
        options: FetcherOptions,
    ) -> Self {
        let validator = FeedValidator::new(client.clone(), options.timeout);
        let reconciler =
            CatalogReconciler::new(db.clone(), validator, options.reconcile_concurrency);
        Self {
            db,
            client,
            sources,
            timeout: options.timeout,
            reconciler,
            guard: ConcurrencyGuard::new(),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.guard.is_running()
    }

    /// Run one refresh cycle unless one is already running.
    ///
    /// Categories are processed one after another (personal, company,
    /// video). A category that cannot be downloaded or parsed is skipped;
    /// the others still run.
    pub async fn refresh(&self) -> Option<RefreshReport> {
        let report = self.guard.try_run(|| self.run_cycle()).await;
        if report.is_none() {
            tracing::info!("Catalog refresh already in progress, skipping");
        }
        report
    }

    /// Time the last refresh cycle finished, if one ever has.
    pub async fn last_fetched(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let Some(value) = self.db.get_metadata(LAST_FETCHED_KEY).await? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&value)?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    async fn run_cycle(&self) -> RefreshReport {
        let mut categories = Vec::with_capacity(Category::ALL.len());

        for category in Category::ALL {
            let result = self.refresh_category(category).await;
            match &result {
                CategoryResult::Refreshed(stats) => {
                    tracing::info!(category = %category, stats = %stats, "Blogs refreshed");
                }
                CategoryResult::Skipped(SkipReason::InvalidUrl(e)) => {
                    tracing::warn!(category = %category, error = %e, "No usable catalog URL configured, skipping");
                }
                CategoryResult::Failed(e) => {
                    tracing::error!(category = %category, error = %e, "Catalog refresh failed");
                }
            }
            categories.push((category, result));
        }

        let finished_at = Utc::now();
        if let Err(e) = self
            .db
            .set_metadata(LAST_FETCHED_KEY, &finished_at.to_rfc3339())
            .await
        {
            tracing::warn!(error = %e, "Failed to record last fetch time");
        }

        RefreshReport {
            categories,
            finished_at,
        }
    }

    async fn refresh_category(&self, category: Category) -> CategoryResult {
        let url = match validate_url(self.sources.url_for(category).unwrap_or_default()) {
            Ok(url) => url,
            Err(e) => return CategoryResult::Skipped(SkipReason::InvalidUrl(e)),
        };

        let entries = match self.load_catalog(url.as_str(), category).await {
            Ok(entries) => entries,
            Err(e) => return CategoryResult::Failed(e),
        };
        tracing::debug!(category = %category, entries = entries.len(), "Catalog downloaded");

        CategoryResult::Refreshed(self.reconciler.reconcile(entries).await)
    }

    async fn load_catalog(
        &self,
        url: &str,
        category: Category,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        let body = download(&self.client, url, self.timeout, MAX_CATALOG_SIZE).await?;
        Ok(parse_catalog(&body, category)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Blog</title>
    <link>https://blog.example.com/</link>
</channel></rss>"#;

    async fn fetcher(sources: CatalogSources) -> (CatalogFetcher, Database) {
        let db = Database::open(":memory:").await.unwrap();
        let options = FetcherOptions {
            timeout: Duration::from_secs(5),
            reconcile_concurrency: 4,
        };
        (
            CatalogFetcher::new(db.clone(), reqwest::Client::new(), sources, options),
            db,
        )
    }

    async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_failed_category_does_not_stop_others() {
        let server = MockServer::start().await;
        mount(&server, "/personal.json", ResponseTemplate::new(200).set_body_string("{oops")).await;
        mount(
            &server,
            "/company.json",
            ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"bloggers":[{{"id":"c1","name":"Acme","rss":"{}/feed"}}]}}"#,
                server.uri()
            )),
        )
        .await;
        mount(&server, "/video.json", ResponseTemplate::new(503)).await;
        mount(&server, "/feed", ResponseTemplate::new(200).set_body_string(RSS)).await;

        let sources = CatalogSources {
            personal: Some(format!("{}/personal.json", server.uri())),
            company: Some(format!("{}/company.json", server.uri())),
            video: Some(format!("{}/video.json", server.uri())),
        };
        let (fetcher, db) = fetcher(sources).await;

        let report = fetcher.refresh().await.unwrap();

        assert!(matches!(
            report.result(Category::Personal),
            Some(CategoryResult::Failed(CatalogError::Parse(_)))
        ));
        assert!(matches!(
            report.result(Category::Video),
            Some(CategoryResult::Failed(CatalogError::Fetch(FetchError::HttpStatus(503))))
        ));
        assert_eq!(report.statistics(Category::Company).unwrap().created, 1);

        let blogs = db.get_all_blogs().await.unwrap();
        assert_eq!(blogs.len(), 1);
        assert_eq!(blogs[0].category, Category::Company);
        assert!(fetcher.last_fetched().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_or_invalid_url_is_skipped() {
        let server = MockServer::start().await;
        mount(&server, "/video.json", ResponseTemplate::new(200).set_body_string(r#"{"bloggers":[]}"#)).await;

        let sources = CatalogSources {
            personal: None,
            company: Some("ftp://catalog.example.com/company.json".to_string()),
            video: Some(format!("{}/video.json", server.uri())),
        };
        let (fetcher, _db) = fetcher(sources).await;

        let report = fetcher.refresh().await.unwrap();

        let order: Vec<Category> = report.categories.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, Category::ALL.to_vec());
        assert!(matches!(
            report.result(Category::Personal),
            Some(CategoryResult::Skipped(SkipReason::InvalidUrl(UrlValidationError::Empty)))
        ));
        assert!(matches!(
            report.result(Category::Company),
            Some(CategoryResult::Skipped(SkipReason::InvalidUrl(
                UrlValidationError::UnsupportedScheme(_)
            )))
        ));
        assert_eq!(
            report.statistics(Category::Video),
            Some(&UpdateStatistics::default())
        );
    }

    #[tokio::test]
    async fn test_last_fetched_unset_before_first_refresh() {
        let (fetcher, _db) = fetcher(CatalogSources::default()).await;
        assert_eq!(fetcher.last_fetched().await.unwrap(), None);

        let report = fetcher.refresh().await.unwrap();
        let stored = fetcher.last_fetched().await.unwrap().unwrap();
        assert_eq!(stored.timestamp(), report.finished_at.timestamp());
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/personal.json",
            ResponseTemplate::new(200)
                .set_body_string(r#"{"bloggers":[]}"#)
                .set_delay(Duration::from_millis(500)),
        )
        .await;

        let sources = CatalogSources {
            personal: Some(format!("{}/personal.json", server.uri())),
            ..CatalogSources::default()
        };
        let (fetcher, _db) = fetcher(sources).await;
        let fetcher = Arc::new(fetcher);

        let running = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.refresh().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fetcher.is_refreshing());
        assert!(fetcher.refresh().await.is_none());

        assert!(running.await.unwrap().is_some());
        assert!(!fetcher.is_refreshing());
    }

    #[test]
    fn test_category_result_display() {
        let refreshed = CategoryResult::Refreshed(UpdateStatistics {
            created: 1,
            ..UpdateStatistics::default()
        });
        assert_eq!(
            refreshed.to_string(),
            "created: 1, updated: 0, not changed: 0, invalid: 0, failed: 0"
        );

        let skipped = CategoryResult::Skipped(SkipReason::InvalidUrl(UrlValidationError::Empty));
        assert_eq!(skipped.to_string(), "skipped: no usable catalog URL (URL is empty)");

        let failed = CategoryResult::Failed(CatalogError::Fetch(FetchError::HttpStatus(503)));
        assert_eq!(
            failed.to_string(),
            "failed: Failed to download catalog: HTTP error: status 503"
        );
    }
}
