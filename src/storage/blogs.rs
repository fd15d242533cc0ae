use super::schema::Database;
use super::types::{BlogDraft, BlogRecord, DatabaseError};

const BLOG_COLUMNS: &str =
    "id, external_id, author, rss_url, canonical_url, twitter, category, date_added, active";

impl Database {
    // ========================================================================
    // Blog Registry Operations
    // ========================================================================

    /// Look up a blog by its catalog identity.
    pub async fn find_blog_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<BlogRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, BlogRecord>(&format!(
            "SELECT {BLOG_COLUMNS} FROM blogs WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Insert a new, active blog.
    ///
    /// Returns the new row id, or `None` if a blog with the same
    /// `external_id` already exists (nothing is written in that case).
    pub async fn insert_blog(
        &self,
        draft: &BlogDraft,
        date_added: i64,
    ) -> Result<Option<i64>, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO blogs
                (external_id, author, rss_url, canonical_url, twitter, category, date_added, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(external_id) DO NOTHING
            RETURNING id
        "#,
        )
        .bind(&draft.external_id)
        .bind(&draft.author)
        .bind(&draft.rss_url)
        .bind(&draft.canonical_url)
        .bind(&draft.twitter)
        .bind(draft.category)
        .bind(date_added)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Overwrite the catalog-controlled fields of an existing blog.
    ///
    /// `date_added` and `active` are left untouched. Returns `false` if no
    /// row has the given id.
    pub async fn update_blog(&self, id: i64, draft: &BlogDraft) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE blogs SET
                external_id = ?,
                author = ?,
                rss_url = ?,
                canonical_url = ?,
                twitter = ?,
                category = ?
            WHERE id = ?
        "#,
        )
        .bind(&draft.external_id)
        .bind(&draft.author)
        .bind(&draft.rss_url)
        .bind(&draft.canonical_url)
        .bind(&draft.twitter)
        .bind(draft.category)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Blogs whose feeds should be polled, ordered by author.
    pub async fn get_active_blogs(&self) -> Result<Vec<BlogRecord>, DatabaseError> {
        let blogs = sqlx::query_as::<_, BlogRecord>(&format!(
            "SELECT {BLOG_COLUMNS} FROM blogs WHERE active = 1 ORDER BY author, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(blogs)
    }

    /// Every blog in the registry, ordered by id.
    pub async fn get_all_blogs(&self) -> Result<Vec<BlogRecord>, DatabaseError> {
        let blogs =
            sqlx::query_as::<_, BlogRecord>(&format!("SELECT {BLOG_COLUMNS} FROM blogs ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(blogs)
    }

    /// Enable or disable polling for a blog.
    #[cfg(test)]
    pub(crate) async fn set_blog_active(&self, id: i64, active: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE blogs SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
