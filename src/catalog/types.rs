use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::storage::{BlogDraft, Category};
use crate::util::non_blank;

// ============================================================================
// Catalog Documents
// ============================================================================

/// Wire shape of a catalog: `{"bloggers": [...]}`.
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    bloggers: Vec<RawCatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct RawCatalogEntry {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rss: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    twitter: Option<String>,
}

/// Catalog ids are strings, but some catalogs list them as bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// One blog as listed in a catalog, tagged with the catalog's category.
///
/// Text fields are sanitized on parse; blank optional values are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub external_id: String,
    pub name: String,
    pub rss_url: Option<String>,
    /// Site link declared by the catalog. Informational only: the canonical
    /// URL always comes from the feed itself.
    pub url: Option<String>,
    pub twitter: Option<String>,
    pub category: Category,
}

impl CatalogEntry {
    /// Entries without a feed URL are never reconciled.
    pub fn has_rss(&self) -> bool {
        self.rss_url.is_some()
    }

    /// Registry fields for this entry with the given canonical URL.
    pub(crate) fn to_draft(&self, rss_url: &str, canonical_url: Option<String>) -> BlogDraft {
        BlogDraft {
            external_id: self.external_id.clone(),
            author: self.name.clone(),
            rss_url: rss_url.to_string(),
            canonical_url,
            twitter: self.twitter.clone(),
            category: self.category,
        }
    }
}

/// Parses a catalog document and tags every entry with `category`.
///
/// Entries with a blank id are dropped with a warning.
///
/// # Errors
///
/// Returns the JSON error if the document is malformed or lacks the
/// `bloggers` array.
pub fn parse_catalog(bytes: &[u8], category: Category) -> Result<Vec<CatalogEntry>, serde_json::Error> {
    let document: CatalogDocument = serde_json::from_slice(bytes)?;

    let entries = document
        .bloggers
        .into_iter()
        .filter_map(|raw| {
            let Some(external_id) = non_blank(Some(&raw.id)) else {
                tracing::warn!(category = %category, name = ?raw.name, "Catalog entry without id, ignoring");
                return None;
            };
            Some(CatalogEntry {
                external_id,
                name: non_blank(raw.name.as_deref()).unwrap_or_default(),
                rss_url: non_blank(raw.rss.as_deref()),
                url: non_blank(raw.url.as_deref()),
                twitter: non_blank(raw.twitter.as_deref()),
                category,
            })
        })
        .collect();

    Ok(entries)
}

// ============================================================================
// Outcomes
// ============================================================================

/// What reconciliation did with one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOutcome {
    /// A new blog was registered
    Created,
    /// An existing blog's fields were rewritten
    Updated,
    /// The stored blog already matched the catalog
    NotChanged,
    /// Unknown blog whose feed did not resolve; nothing was stored
    Invalid,
    /// The store rejected a read or write for this entry
    Failed,
}

impl UpdateOutcome {
    /// Every outcome, in reporting order.
    pub const ALL: [UpdateOutcome; 5] = [
        UpdateOutcome::Created,
        UpdateOutcome::Updated,
        UpdateOutcome::NotChanged,
        UpdateOutcome::Invalid,
        UpdateOutcome::Failed,
    ];
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateOutcome::Created => "created",
            UpdateOutcome::Updated => "updated",
            UpdateOutcome::NotChanged => "not changed",
            UpdateOutcome::Invalid => "invalid",
            UpdateOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-outcome counts for one reconciled batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStatistics {
    pub created: usize,
    pub updated: usize,
    pub not_changed: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl UpdateStatistics {
    pub fn count(&self, outcome: UpdateOutcome) -> usize {
        match outcome {
            UpdateOutcome::Created => self.created,
            UpdateOutcome::Updated => self.updated,
            UpdateOutcome::NotChanged => self.not_changed,
            UpdateOutcome::Invalid => self.invalid,
            UpdateOutcome::Failed => self.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.not_changed + self.invalid + self.failed
    }
}

impl FromIterator<UpdateOutcome> for UpdateStatistics {
    fn from_iter<I: IntoIterator<Item = UpdateOutcome>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut stats, outcome| {
            match outcome {
                UpdateOutcome::Created => stats.created += 1,
                UpdateOutcome::Updated => stats.updated += 1,
                UpdateOutcome::NotChanged => stats.not_changed += 1,
                UpdateOutcome::Invalid => stats.invalid += 1,
                UpdateOutcome::Failed => stats.failed += 1,
            }
            stats
        })
    }
}

impl fmt::Display for UpdateStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, outcome) in UpdateOutcome::ALL.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", outcome, self.count(outcome))?;
        }
        Ok(())
    }
}
