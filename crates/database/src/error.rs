use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Value conversion failed: {0}")]
    Conversion(#[from] core_types::CoreError),

    #[error("`{0}` is not a valid table or column name")]
    InvalidIdentifier(String),

    #[error("Bad insert call - you attempted to insert nothing.")]
    NothingToInsert,

    #[error("Bad update call - you attempted to update nothing.")]
    NothingToUpdate,

    #[error("An update needs at least one column to match rows on.")]
    EmptyMatch,

    #[error("Match column `{0}` has no value in the given fields.")]
    MissingMatchKey(String),

    #[error("The requested data was not found in the database.")]
    NotFound,
}

/// SQLSTATE codes for reads that should behave as "nothing there yet".
const UNDEFINED_TABLE: &str = "42P01";
const UNDEFINED_COLUMN: &str = "42703";

impl DbError {
    /// True when the server rejected a statement because the table, or one of
    /// the columns it names, does not exist.
    pub(crate) fn is_missing_schema(&self) -> bool {
        match self {
            DbError::Sqlx(sqlx::Error::Database(db)) => matches!(
                db.code().as_deref(),
                Some(UNDEFINED_TABLE) | Some(UNDEFINED_COLUMN)
            ),
            _ => false,
        }
    }
}
