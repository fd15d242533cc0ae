use anyhow::Result;

use super::schema::Database;

/// Metadata key holding the RFC 3339 time of the last catalog refresh.
pub const LAST_FETCHED_KEY: &str = "blogs.last_fetched";

impl Database {
    // ========================================================================
    // Metadata Operations
    // ========================================================================

    /// Get a single metadata value by name.
    ///
    /// Names use a dotted convention, e.g. `blogs.last_fetched`.
    pub async fn get_metadata(&self, name: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a metadata value (UPSERT).
    pub async fn set_metadata(&self, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (name, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
