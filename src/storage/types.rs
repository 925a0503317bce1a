use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of feedkeep appears to be running. Please close it and try again.")]
    Locked,

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

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::Locked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A persisted feed source: the record created when the user saves a
/// classified feed.
///
/// Records are immutable once inserted; re-adding the same URL creates a new
/// row rather than updating an existing one, so there is deliberately no
/// UNIQUE constraint on `url`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct FeedSource {
    pub id: i64,
    pub title: String,
    pub url: String,
    /// Unix timestamp of insertion; `list_sources` orders by it (ties broken by id).
    pub added_at: i64,
}

/// A feed source about to be persisted. Only ever constructed from a
/// successfully classified RSS feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedSource {
    pub title: String,
    pub url: String,
}
