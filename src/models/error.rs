use thiserror::Error;

/// Failures reported by a [`RowStore`](crate::repo::row_store::RowStore).
///
/// None of these ever reach the code that submitted a record; the transport
/// turns them into a diagnostic line and a failed delivery.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create database connection pool for '{path}': {cause}")]
    Pool { path: String, cause: r2d2::Error },

    #[error("Failed to get database connection from pool: {0}")]
    Connection(#[from] r2d2::Error),

    #[error("Failed to insert into {table}: {cause}")]
    Insert {
        table: String,
        cause: rusqlite::Error,
    },

    #[error("Database query failed for '{operation}': {cause}")]
    Query {
        operation: String,
        cause: rusqlite::Error,
    },

    #[error("Failed to encode log metadata: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to decode log metadata for row {id}: {cause}")]
    Decode { id: i64, cause: serde_json::Error },

    #[error("Insert into {table} rejected: {reason}")]
    Rejected { table: String, reason: String },

    #[error("Row store panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("No log table defined: set LOGS_TABLE_NAME to the target table")]
    MissingTableName,

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid log record: {0}")]
    InvalidRecord(#[source] serde_json::Error),

    #[error("Failed to build delivery thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ForwardError>;
