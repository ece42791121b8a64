use serde::Serialize;
use serde_json::{Map, Value};

/// The row written for an admitted record. The store assigns the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedRow {
    pub level: String,
    pub message: String,
    pub meta: Map<String, Value>,
}

/// A row read back from the logs table.
#[derive(Debug, Clone, Serialize)]
pub struct StoredLogRow {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub meta: Value,
    pub timestamp: String,
}
