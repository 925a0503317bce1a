use super::schema::Database;
use super::types::{DatabaseError, FeedSource, NewFeedSource};

impl Database {
    // ========================================================================
    // Feed Source Operations
    // ========================================================================

    /// Insert a new feed source, returning its generated id.
    ///
    /// Always inserts: saving the same URL twice yields two records.
    pub async fn insert_source(&self, source: &NewFeedSource) -> Result<i64, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO sources (title, url, added_at)
            VALUES (?, ?, ?)
        "#,
        )
        .bind(&source.title)
        .bind(&source.url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// Get all feed sources in insertion order.
    pub async fn list_sources(&self) -> Result<Vec<FeedSource>, DatabaseError> {
        let sources = sqlx::query_as::<_, FeedSource>(
            r#"
            SELECT id, title, url, added_at
            FROM sources
            ORDER BY added_at, id
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(sources)
    }

    /// Get a single feed source by id.
    pub async fn get_source(&self, id: i64) -> Result<Option<FeedSource>, DatabaseError> {
        let source = sqlx::query_as::<_, FeedSource>(
            r#"
            SELECT id, title, url, added_at
            FROM sources
            WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(source)
    }

    /// Delete a feed source. Returns true if a record was removed.
    pub async fn delete_source(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
