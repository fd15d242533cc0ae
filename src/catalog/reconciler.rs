use chrono::Utc;
use futures::stream::{self, StreamExt};

use super::change::differs;
use super::types::{CatalogEntry, UpdateOutcome, UpdateStatistics};
use crate::feed::FeedValidator;
use crate::storage::{BlogDraft, BlogRecord, Database, DatabaseError};

/// Default number of entries reconciled at once.
pub const DEFAULT_RECONCILE_CONCURRENCY: usize = 10;

/// Brings the blog registry in line with one catalog batch.
///
/// Entries are processed independently and concurrently; a failure in one
/// never affects the others. Blogs are only ever created or updated, never
/// removed.
#[derive(Clone)]
pub struct CatalogReconciler {
    db: Database,
    validator: FeedValidator,
    concurrency: usize,
}

impl CatalogReconciler {
    pub fn new(db: Database, validator: FeedValidator, concurrency: usize) -> Self {
        Self {
            db,
            validator,
            concurrency: concurrency.max(1),
        }
    }

    /// Reconcile `entries` and return per-outcome counts.
    ///
    /// Entries without a feed URL are skipped and not counted.
    pub async fn reconcile(&self, entries: Vec<CatalogEntry>) -> UpdateStatistics {
        let (with_feed, without_feed): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(CatalogEntry::has_rss);
        if !without_feed.is_empty() {
            tracing::debug!(skipped = without_feed.len(), "Catalog entries without a feed ignored");
        }

        let outcomes: Vec<UpdateOutcome> = stream::iter(with_feed.into_iter().filter_map(|entry| {
            let rss_url = entry.rss_url.clone()?;
            Some((entry, rss_url))
        }))
        .map(|(entry, rss_url)| self.reconcile_entry(entry, rss_url))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        outcomes.into_iter().collect()
    }

    async fn reconcile_entry(&self, entry: CatalogEntry, rss_url: String) -> UpdateOutcome {
        match self.apply(&entry, &rss_url).await {
            Ok(outcome) => {
                tracing::debug!(
                    id = %entry.external_id,
                    category = %entry.category,
                    outcome = %outcome,
                    "Reconciled catalog entry"
                );
                outcome
            }
            Err(e) => {
                tracing::error!(
                    id = %entry.external_id,
                    category = %entry.category,
                    error = %e,
                    "Failed to store blog"
                );
                UpdateOutcome::Failed
            }
        }
    }

    async fn apply(&self, entry: &CatalogEntry, rss_url: &str) -> Result<UpdateOutcome, DatabaseError> {
        if let Some(existing) = self.db.find_blog_by_external_id(&entry.external_id).await? {
            return self.refresh_existing(entry, rss_url, existing).await;
        }

        let Some(canonical_url) = self.validator.resolve(rss_url).await else {
            tracing::warn!(
                id = %entry.external_id,
                rss = %rss_url,
                "Feed did not resolve to a site, blog not added"
            );
            return Ok(UpdateOutcome::Invalid);
        };

        let draft = entry.to_draft(rss_url, Some(canonical_url));
        if self.db.insert_blog(&draft, Utc::now().timestamp()).await?.is_some() {
            return Ok(UpdateOutcome::Created);
        }

        // Another entry with the same id was inserted first in this batch.
        match self.db.find_blog_by_external_id(&entry.external_id).await? {
            Some(existing) => self.write_if_changed(&existing, &draft).await,
            None => Err(DatabaseError::Other(sqlx::Error::RowNotFound)),
        }
    }

    async fn refresh_existing(
        &self,
        entry: &CatalogEntry,
        rss_url: &str,
        existing: BlogRecord,
    ) -> Result<UpdateOutcome, DatabaseError> {
        let canonical_url = match self.validator.resolve(rss_url).await {
            Some(link) => Some(link),
            None => {
                tracing::warn!(
                    id = %entry.external_id,
                    rss = %rss_url,
                    "Feed did not resolve, keeping stored site link"
                );
                existing.canonical_url.clone()
            }
        };

        let candidate = entry.to_draft(rss_url, canonical_url);
        self.write_if_changed(&existing, &candidate).await
    }

    async fn write_if_changed(
        &self,
        existing: &BlogRecord,
        candidate: &BlogDraft,
    ) -> Result<UpdateOutcome, DatabaseError> {
        if !differs(existing, candidate) {
            return Ok(UpdateOutcome::NotChanged);
        }

        self.db.update_blog(existing.id, candidate).await?;
        Ok(UpdateOutcome::Updated)
    }
}
