use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database
    #[error("The blog database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Catalog a blog was listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Category {
    Personal,
    Company,
    Video,
}

impl Category {
    /// All categories in the order a refresh cycle visits them.
    pub const ALL: [Category; 3] = [Category::Personal, Category::Company, Category::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Company => "company",
            Category::Video => "video",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blog registry row.
///
/// `external_id` is the catalog's identity for the blog and is unique.
/// `date_added` is written once, on insert.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BlogRecord {
    pub id: i64,
    pub external_id: String,
    pub author: String,
    pub rss_url: String,
    pub canonical_url: Option<String>,
    pub twitter: Option<String>,
    pub category: Category,
    pub date_added: i64,
    pub active: bool,
}

/// The catalog-controlled fields of a blog.
///
/// Used to insert new records and as the candidate view of an existing
/// record when deciding whether an update is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogDraft {
    pub external_id: String,
    pub author: String,
    pub rss_url: String,
    pub canonical_url: Option<String>,
    pub twitter: Option<String>,
    pub category: Category,
}

impl BlogRecord {
    /// Current catalog-controlled fields of this record.
    pub fn draft(&self) -> BlogDraft {
        BlogDraft {
            external_id: self.external_id.clone(),
            author: self.author.clone(),
            rss_url: self.rss_url.clone(),
            canonical_url: self.canonical_url.clone(),
            twitter: self.twitter.clone(),
            category: self.category,
        }
    }
}
