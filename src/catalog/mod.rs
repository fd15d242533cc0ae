//! Catalog synchronization.
//!
//! Three remote JSON catalogs (personal, company, video) list the blogs the
//! registry should know about. A refresh cycle downloads each catalog,
//! validates every listed feed, and creates or updates the matching blog
//! records. Cycles are single-flight: overlapping triggers are dropped.

mod background;
mod change;
mod fetcher;
mod guard;
mod reconciler;
mod types;

pub use background::BackgroundRefresher;
pub use change::differs;
pub use fetcher::{
    CatalogError, CatalogFetcher, CatalogSources, CategoryResult, FetcherOptions, RefreshReport,
    SkipReason,
};
pub use guard::ConcurrencyGuard;
pub use reconciler::{CatalogReconciler, DEFAULT_RECONCILE_CONCURRENCY};
pub use types::{parse_catalog, CatalogEntry, UpdateOutcome, UpdateStatistics};
